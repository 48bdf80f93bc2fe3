//! Per-message request handling.
//!
//! [`Dispatcher::handle`] takes one raw message from a channel through
//! sender normalization, the trust gate, classification, and reply
//! composition, and always ends with exactly one usage record.

use crate::address::{hash_identity, normalize_sender};
use crate::archive::{new_diagnostic_ref, MessageArchive};
use crate::channel::{Channel, InboundMessage, OutboundMessage};
use crate::i18n::{fill, MessageKey, Translator};
use crate::usage::UsageSink;
use crate::{DispatchError, DispatchResult};
use chrono::Utc;
use courier_config_and_utils::{ChannelKind, ChannelPolicies, ChannelPolicy, Config, RequestType};
use courier_database::{UsageRecord, UsageStatus};
use link_catalog::{CatalogError, LinkCatalog};
use request_classifier::{Classifier, ClassifierPolicy, Request, Vocabulary};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use trust_gate::{Admission, Sender, TrustGate};

/// Reply bodies and the status they stand for.
struct Outcome {
    status: UsageStatus,
    bodies: Vec<String>,
    diagnostic_ref: Option<String>,
}

impl Outcome {
    fn reply(status: UsageStatus, body: String) -> Self {
        Self {
            status,
            bodies: vec![body],
            diagnostic_ref: None,
        }
    }

    fn silent(status: UsageStatus) -> Self {
        Self {
            status,
            bodies: Vec::new(),
            diagnostic_ref: None,
        }
    }
}

/// Shared decision core every channel funnels into.
pub struct Dispatcher {
    gate: TrustGate,
    catalog: LinkCatalog,
    classifiers: HashMap<ChannelKind, Classifier>,
    policies: ChannelPolicies,
    translator: Arc<dyn Translator>,
    usage: Arc<dyn UsageSink>,
    service_addresses: HashSet<String>,
    mirrors_file: Option<PathBuf>,
    archive: Option<MessageArchive>,
}

impl Dispatcher {
    /// Assemble a dispatcher from a validated config and its collaborators.
    pub fn new(
        config: &Config,
        catalog: LinkCatalog,
        gate: TrustGate,
        translator: Arc<dyn Translator>,
        usage: Arc<dyn UsageSink>,
    ) -> DispatchResult<Self> {
        let vocabulary = Vocabulary::from_settings(catalog.settings());
        let mut classifiers = HashMap::new();
        for kind in ChannelKind::ALL {
            let policy = ClassifierPolicy::for_channel(
                kind,
                config.channels.get(kind),
                catalog.locale_policy(kind),
            );
            classifiers.insert(kind, Classifier::new(vocabulary.clone(), policy)?);
        }

        let service_addresses = ChannelKind::ALL
            .iter()
            .flat_map(|kind| {
                config
                    .service_addresses
                    .iter()
                    .filter_map(move |addr| normalize_sender(*kind, addr).ok())
            })
            .collect();

        Ok(Self {
            gate,
            catalog,
            classifiers,
            policies: config.channels.clone(),
            translator,
            usage,
            service_addresses,
            mirrors_file: config.mirrors_file.clone(),
            archive: None,
        })
    }

    /// Keep raw copies of messages whose reply failed.
    pub fn with_archive(mut self, archive: MessageArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    fn policy(&self, kind: ChannelKind) -> &ChannelPolicy {
        self.policies.get(kind)
    }

    /// Handle one raw message end to end.
    pub async fn handle(&self, raw: &str, channel: &dyn Channel) -> UsageRecord {
        let kind = channel.kind();
        let span = info_span!("handle", channel = %kind);
        let record = self.process(raw, channel).instrument(span).await;

        if let Err(e) = self.usage.record(&record).await {
            error!(
                channel = %kind,
                status = record.status.as_str(),
                error = %e,
                "Failed to store usage record"
            );
        }
        record
    }

    async fn process(&self, raw: &str, channel: &dyn Channel) -> UsageRecord {
        let kind = channel.kind();
        let now = Utc::now();

        let inbound = match channel.receive(raw) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(error = %e, "Unreadable message dropped");
                return UsageRecord::unclassified(kind, UsageStatus::Malformed, now);
            }
        };

        let identity = match self.identify(kind, &inbound) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Message dropped");
                return UsageRecord::unclassified(kind, UsageStatus::Malformed, now);
            }
        };
        let user_hash = hash_identity(&identity);

        // Classification is pure; the locale is also needed for the
        // authentication notice.
        let request = match self.classifiers.get(&kind) {
            Some(classifier) => classifier.parse_with_recipient(
                &user_hash,
                &inbound.body,
                inbound.recipient.as_deref(),
            ),
            None => {
                let diagnostic_ref = new_diagnostic_ref();
                error!(diagnostic_ref = %diagnostic_ref, "No classifier for channel");
                let mut record = UsageRecord::unclassified(kind, UsageStatus::CoreError, now);
                record.diagnostic_ref = Some(diagnostic_ref);
                return record;
            }
        };

        let sender = Sender {
            identity: &identity,
            user_hash: &user_hash,
            service: kind.as_str(),
            authenticated: inbound.authenticated,
        };
        let outcome = match self.gate.admit(&sender, self.policy(kind)).await {
            Ok(Admission::Serve) => self.compose(&request).await,
            Ok(Admission::Warn) => Outcome::reply(
                UsageStatus::Unauthenticated,
                self.text(&request.locale, MessageKey::Unauthenticated),
            ),
            Ok(Admission::Ignore) => Outcome::silent(UsageStatus::Unauthenticated),
            Ok(Admission::Blocked) => Outcome::silent(UsageStatus::Blacklisted),
            Ok(Admission::RateLimited) => Outcome::silent(UsageStatus::TooManyRequests),
            Err(e) => {
                let diagnostic_ref = new_diagnostic_ref();
                error!(user_hash = %user_hash, diagnostic_ref = %diagnostic_ref, error = %e, "Trust gate failed");
                Outcome {
                    diagnostic_ref: Some(diagnostic_ref),
                    ..Outcome::silent(UsageStatus::CoreError)
                }
            }
        };

        let mut record = UsageRecord {
            timestamp: now,
            channel: kind,
            request_type: Some(request.request_type),
            os: request.os.clone(),
            locale: Some(request.locale.clone()),
            status: outcome.status,
            diagnostic_ref: outcome.diagnostic_ref.clone(),
        };

        if let Err(e) = self.deliver(channel, &inbound, &request, &outcome.bodies).await {
            let diagnostic_ref = record
                .diagnostic_ref
                .clone()
                .unwrap_or_else(new_diagnostic_ref);
            error!(user_hash = %user_hash, diagnostic_ref = %diagnostic_ref, error = %e, "Reply not delivered");
            self.archive_raw(&diagnostic_ref, raw).await;
            record.status = UsageStatus::SendFailed;
            record.diagnostic_ref = Some(diagnostic_ref);
        }

        info!(
            user_hash = %user_hash,
            request_type = request.request_type.as_str(),
            status = record.status.as_str(),
            "Message handled"
        );
        record
    }

    /// Normalized sender, rejecting our own addresses.
    fn identify(&self, kind: ChannelKind, inbound: &InboundMessage) -> DispatchResult<String> {
        let identity = normalize_sender(kind, &inbound.sender)?;
        if self.service_addresses.contains(&identity) {
            return Err(DispatchError::Address(
                "message from our own address".to_string(),
            ));
        }
        Ok(identity)
    }

    /// Reply bodies for an admitted request.
    async fn compose(&self, request: &Request) -> Outcome {
        match request.request_type {
            RequestType::Help => Outcome::reply(UsageStatus::Ok, self.help_text(&request.locale)),
            RequestType::Mirrors => self.compose_mirrors(&request.locale).await,
            RequestType::Links => self.compose_links(request),
        }
    }

    async fn compose_mirrors(&self, locale: &str) -> Outcome {
        let mirrors = match &self.mirrors_file {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| warn!(path = %path.display(), error = %e, "Mirrors file unreadable"))
                .ok()
                .filter(|text| !text.trim().is_empty()),
            None => None,
        };

        match mirrors {
            Some(text) => Outcome::reply(
                UsageStatus::Ok,
                format!("{}\n\n{}", self.text(locale, MessageKey::Mirrors), text.trim_end()),
            ),
            None => Outcome::reply(
                UsageStatus::CoreError,
                self.text(locale, MessageKey::MirrorsUnavailable),
            ),
        }
    }

    fn compose_links(&self, request: &Request) -> Outcome {
        let locale = request.locale.as_str();
        let Some(os) = request.os.as_deref() else {
            return self.internal_error(locale, "links request without an OS");
        };

        let blocks = match self.catalog.get_link_blocks(request.channel, os, locale) {
            Ok(blocks) => blocks,
            Err(CatalogError::UnsupportedLocale(requested)) => {
                let default_locale = self.catalog.default_locale().to_string();
                let supported_locales = self.catalog.supported_locales().join(", ");
                return Outcome::reply(
                    UsageStatus::UnsupportedLocale,
                    fill(
                        &self.text(&default_locale, MessageKey::UnsupportedLocale),
                        &[
                            ("locale", requested.as_str()),
                            ("supported_locales", supported_locales.as_str()),
                        ],
                    ),
                );
            }
            Err(CatalogError::UnsupportedOs(requested)) => {
                let supported_os = self.catalog.supported_os().join(", ");
                return Outcome::reply(
                    UsageStatus::UnsupportedOs,
                    fill(
                        &self.text(locale, MessageKey::UnsupportedOs),
                        &[
                            ("os", requested.as_str()),
                            ("supported_os", supported_os.as_str()),
                        ],
                    ),
                );
            }
            Err(e) => return self.internal_error(locale, &e.to_string()),
        };

        let intro = fill(
            &self.text(locale, MessageKey::LinksIntro),
            &[("os", os), ("locale", locale)],
        );
        let pt = request
            .wants_pt_info
            .then(|| self.text(locale, MessageKey::PtGuidance));

        let bodies = if request.wants_split_delivery {
            let total = blocks.len().to_string();
            let last = blocks.len();
            blocks
                .into_iter()
                .enumerate()
                .map(|(idx, block)| {
                    let part = (idx + 1).to_string();
                    let header = fill(
                        &self.text(locale, MessageKey::SplitPart),
                        &[("part", part.as_str()), ("total", total.as_str())],
                    );
                    let mut body = format!("{header}\n\n{intro}\n\n{block}");
                    if idx + 1 == last {
                        if let Some(pt) = &pt {
                            body.push_str(&format!("\n\n{pt}"));
                        }
                    }
                    body
                })
                .collect()
        } else {
            let mut body = format!("{intro}\n\n{}", blocks.join("\n\n"));
            if let Some(pt) = &pt {
                body.push_str(&format!("\n\n{pt}"));
            }
            vec![body]
        };

        debug!(os, locale, parts = bodies.len(), "Links composed");
        Outcome {
            status: UsageStatus::Ok,
            bodies,
            diagnostic_ref: None,
        }
    }

    fn internal_error(&self, locale: &str, detail: &str) -> Outcome {
        let diagnostic_ref = new_diagnostic_ref();
        error!(diagnostic_ref = %diagnostic_ref, detail, "Catalog lookup failed");
        Outcome {
            diagnostic_ref: Some(diagnostic_ref),
            ..Outcome::reply(UsageStatus::CoreError, self.text(locale, MessageKey::InternalError))
        }
    }

    fn help_text(&self, locale: &str) -> String {
        let supported_os = self.catalog.supported_os().join(", ");
        let supported_locales = self.catalog.supported_locales().join(", ");
        fill(
            &self.text(locale, MessageKey::Help),
            &[
                ("supported_os", supported_os.as_str()),
                ("supported_locales", supported_locales.as_str()),
            ],
        )
    }

    fn text(&self, locale: &str, key: MessageKey) -> String {
        self.translator.text(locale, key)
    }

    /// Send every body in order; the first failure stops the rest.
    async fn deliver(
        &self,
        channel: &dyn Channel,
        inbound: &InboundMessage,
        request: &Request,
        bodies: &[String],
    ) -> DispatchResult<()> {
        let subject = self.text(&request.locale, MessageKey::Subject);
        for body in bodies {
            let message = OutboundMessage {
                to: inbound.sender.clone(),
                subject: subject.clone(),
                body: body.clone(),
            };
            channel
                .send(&message)
                .await
                .map_err(|e| DispatchError::Send(e.to_string()))?;
        }
        Ok(())
    }

    async fn archive_raw(&self, diagnostic_ref: &str, raw: &str) {
        let Some(archive) = &self.archive else {
            return;
        };
        if let Err(e) = archive.store(diagnostic_ref, raw).await {
            error!(diagnostic_ref, error = %e, "Failed to archive message");
        }
    }
}
