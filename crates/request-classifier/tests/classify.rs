use courier_config_and_utils::{
    CatalogSettings, ChannelKind, ChannelPolicy, LocalePolicy, RequestType,
};
use request_classifier::{Classifier, ClassifierPolicy, Vocabulary};

fn classifier(channel: ChannelKind, locale_policy: LocalePolicy) -> Classifier {
    let vocabulary = Vocabulary::from_settings(&CatalogSettings::default());
    let policy = ClassifierPolicy::for_channel(
        channel,
        &ChannelPolicy::default_for(channel),
        locale_policy,
    );
    Classifier::new(vocabulary, policy).unwrap()
}

fn email() -> Classifier {
    classifier(ChannelKind::Email, LocalePolicy::Fallback)
}

fn xmpp() -> Classifier {
    classifier(ChannelKind::Xmpp, LocalePolicy::Fallback)
}

#[test]
fn os_then_split_is_a_split_links_request() {
    let request = email().parse("h", "windows\nsplit");
    assert_eq!(request.request_type, RequestType::Links);
    assert_eq!(request.os.as_deref(), Some("windows"));
    assert!(request.wants_split_delivery);
    assert_eq!(request.sender_id, "h");
}

#[test]
fn mirrors_request() {
    let request = email().parse("h", "please send mirrors");
    assert_eq!(request.request_type, RequestType::Mirrors);
    assert!(request.os.is_none());
}

#[test]
fn empty_body_is_help() {
    for classifier in [email(), xmpp()] {
        let request = classifier.parse("h", "");
        assert_eq!(request.request_type, RequestType::Help);
        assert_eq!(request.locale, "en");
        assert!(request.os.is_none());
    }
}

#[test]
fn help_before_any_signal_wins() {
    let request = xmpp().parse("h", "help linux es");
    assert_eq!(request.request_type, RequestType::Help);
    assert!(request.os.is_none());
    assert_eq!(request.locale, "en");
}

#[test]
fn help_after_os_is_ignored() {
    let request = xmpp().parse("h", "linux help");
    assert_eq!(request.request_type, RequestType::Links);
    assert_eq!(request.os.as_deref(), Some("linux"));
}

#[test]
fn first_os_wins_and_mirrors_after_os_keeps_links() {
    let request = email().parse("h", "osx or maybe linux, also mirrors");
    assert_eq!(request.request_type, RequestType::Links);
    assert_eq!(request.os.as_deref(), Some("osx"));
}

#[test]
fn inline_locale_on_messaging_channels() {
    let request = xmpp().parse("h", "Linux FA please");
    assert_eq!(request.os.as_deref(), Some("linux"));
    assert_eq!(request.locale, "fa");
}

#[test]
fn scan_stops_once_os_and_locale_found() {
    let request = xmpp().parse("h", "windows es obfs4 mirrors");
    assert_eq!(request.locale, "es");
    assert!(!request.wants_pt_info);
}

#[test]
fn scan_stops_once_locale_and_mirrors_found() {
    let request = xmpp().parse("h", "mirrors de linux");
    assert_eq!(request.request_type, RequestType::Mirrors);
    assert_eq!(request.locale, "de");
    assert!(request.os.is_none());
}

#[test]
fn email_ignores_inline_locale_tokens() {
    let request = email().parse("h", "linux es");
    assert_eq!(request.locale, "en");
}

#[test]
fn email_lang_marker_sets_locale() {
    let request = email().parse("h", "Lang: de\nlinux");
    assert_eq!(request.os.as_deref(), Some("linux"));
    assert_eq!(request.locale, "de");
}

#[test]
fn email_recipient_plus_tag_is_a_fallback_hint() {
    let c = email();
    let request = c.parse_with_recipient("h", "linux", Some("gettor+ru@example.org"));
    assert_eq!(request.locale, "ru");

    let request = c.parse_with_recipient("h", "Lang: fr\nlinux", Some("gettor+ru@example.org"));
    assert_eq!(request.locale, "fr");

    let request = c.parse_with_recipient("h", "linux", Some("GetTor <gettor+ru@example.org>"));
    assert_eq!(request.locale, "ru");
}

#[test]
fn unsupported_marker_locale_follows_policy() {
    let request = email().parse("h", "lang: xx\nlinux");
    assert_eq!(request.locale, "en");

    let strict = classifier(ChannelKind::Email, LocalePolicy::Reject);
    let request = strict.parse("h", "lang: xx\nlinux");
    assert_eq!(request.locale, "xx");
}

#[test]
fn split_only_where_allowed() {
    let request = xmpp().parse("h", "windows split");
    assert!(!request.wants_split_delivery);
}

#[test]
fn pt_keywords_request_guidance() {
    let request = email().parse("h", "linux with obfs4 bridges");
    assert!(request.wants_pt_info);

    // On messaging channels "pt" is a locale first.
    let request = xmpp().parse("h", "pt windows");
    assert_eq!(request.locale, "pt");
    assert!(!request.wants_pt_info);
}

#[test]
fn quoted_text_and_signature_are_not_scanned() {
    let body = "> windows\nOn Tue, Alice wrote:\n> > mirrors\nosx\n-- \nsent from linux";
    let request = email().parse("h", body);
    assert_eq!(request.os.as_deref(), Some("osx"));
}

#[test]
fn html_is_stripped_on_social() {
    let c = classifier(ChannelKind::Social, LocalePolicy::Fallback);
    let request = c.parse("h", "<div>get me <b>windows</b> in <i>it</i></div>");
    assert_eq!(request.os.as_deref(), Some("windows"));
    assert_eq!(request.locale, "it");
}
