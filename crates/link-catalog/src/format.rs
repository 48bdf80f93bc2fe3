//! Catalog file codec.
//!
//! A catalog file is an INI-style document:
//!
//! ```text
//! [provider]
//! name = Acme
//!
//! [key]
//! fingerprint = ABCD
//!
//! [linux]
//! en = https://x/a32$https://x/a32.asc$sha32$,https://x/a64$https://x/a64.asc$sha64$
//! 	https://x/b32$https://x/b32.asc$sha32b$,https://x/b64$https://x/b64.asc$sha64b$
//! ```
//!
//! Every section other than `provider` and `key` is an OS section. Each
//! locale value is a history of releases, oldest first: the first release
//! follows `=`, later ones are indented continuation lines. A release is
//! one or more comma-joined `binary$signature$sha256$` triples, one per
//! architecture.

use crate::{CatalogError, CatalogResult};

const PROVIDER_SECTION: &str = "provider";
const KEY_SECTION: &str = "key";
const TRIPLE_DELIMITER: char = '$';
const ARCH_DELIMITER: char = ',';

/// One downloadable artifact: binary, detached signature, checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub binary_url: String,
    pub signature_url: String,
    pub sha256: String,
}

/// One published release for a locale: a record per architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub records: Vec<LinkRecord>,
}

impl Release {
    /// Parse `bin$sig$sha$[,bin$sig$sha$...]`.
    ///
    /// The trailing `$` of each triple is optional; every part must be
    /// non-empty.
    pub fn parse(value: &str) -> CatalogResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(CatalogError::LinkFormat("empty link".to_string()));
        }

        let records = value
            .split(ARCH_DELIMITER)
            .map(parse_triple)
            .collect::<CatalogResult<Vec<_>>>()?;
        Ok(Self { records })
    }

    /// Render back to the on-disk form.
    pub fn render(&self) -> String {
        self.records
            .iter()
            .map(|r| {
                format!(
                    "{}{d}{}{d}{}{d}",
                    r.binary_url,
                    r.signature_url,
                    r.sha256,
                    d = TRIPLE_DELIMITER
                )
            })
            .collect::<Vec<_>>()
            .join(&ARCH_DELIMITER.to_string())
    }
}

fn parse_triple(raw: &str) -> CatalogResult<LinkRecord> {
    let raw = raw.trim();
    let body = raw.strip_suffix(TRIPLE_DELIMITER).unwrap_or(raw);
    let parts: Vec<&str> = body.split(TRIPLE_DELIMITER).map(str::trim).collect();

    match parts.as_slice() {
        [binary, signature, sha]
            if !binary.is_empty() && !signature.is_empty() && !sha.is_empty() =>
        {
            Ok(LinkRecord {
                binary_url: binary.to_string(),
                signature_url: signature.to_string(),
                sha256: sha.to_string(),
            })
        }
        _ => Err(CatalogError::LinkFormat(format!(
            "expected binary{d}signature{d}sha256{d}, got '{raw}'",
            d = TRIPLE_DELIMITER
        ))),
    }
}

/// Release history of one locale, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleEntry {
    pub locale: String,
    pub history: Vec<Release>,
}

impl LocaleEntry {
    /// The most recently appended release.
    pub fn latest(&self) -> Option<&Release> {
        self.history.last()
    }
}

/// Locale entries of one OS section, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsSection {
    pub os: String,
    pub entries: Vec<LocaleEntry>,
}

impl OsSection {
    /// Entry for a locale (case-insensitive).
    pub fn entry(&self, locale: &str) -> Option<&LocaleEntry> {
        self.entries
            .iter()
            .find(|e| e.locale.eq_ignore_ascii_case(locale))
    }

    /// Append a release to a locale, creating the entry when absent.
    pub fn append(&mut self, locale: &str, release: Release) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.locale.eq_ignore_ascii_case(locale))
        {
            Some(entry) => entry.history.push(release),
            None => self.entries.push(LocaleEntry {
                locale: locale.to_lowercase(),
                history: vec![release],
            }),
        }
    }
}

/// Parsed contents of one provider's catalog file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogFile {
    pub name: String,
    pub fingerprint: String,
    pub sections: Vec<OsSection>,
}

impl CatalogFile {
    /// A fresh catalog with one empty section per OS.
    pub fn skeleton(name: &str, fingerprint: &str, supported_os: &[String]) -> Self {
        Self {
            name: name.to_string(),
            fingerprint: fingerprint.to_string(),
            sections: supported_os
                .iter()
                .map(|os| OsSection {
                    os: os.to_lowercase(),
                    entries: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn section(&self, os: &str) -> Option<&OsSection> {
        self.sections.iter().find(|s| s.os.eq_ignore_ascii_case(os))
    }

    pub fn section_mut(&mut self, os: &str) -> Option<&mut OsSection> {
        self.sections
            .iter_mut()
            .find(|s| s.os.eq_ignore_ascii_case(os))
    }

    /// Parse a catalog document.
    pub fn parse(content: &str) -> CatalogResult<Self> {
        let mut name = None;
        let mut fingerprint = None;
        let mut sections: Vec<OsSection> = Vec::new();
        let mut current: Option<String> = None;
        // (os section index, entry index) of the key a continuation extends
        let mut open_entry: Option<(usize, usize)> = None;

        for (idx, raw_line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim_end();
            let trimmed = line.trim_start();

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if line.starts_with([' ', '\t']) {
                let (s, e) = open_entry.ok_or_else(|| {
                    CatalogError::LinkFormat(format!("line {line_no}: continuation without a key"))
                })?;
                let release = Release::parse(trimmed).map_err(|e| at_line(line_no, e))?;
                sections[s].entries[e].history.push(release);
                continue;
            }

            if let Some(header) = trimmed.strip_prefix('[') {
                let header = header.strip_suffix(']').ok_or_else(|| {
                    CatalogError::LinkFormat(format!("line {line_no}: unterminated section header"))
                })?;
                let header = header.trim().to_lowercase();
                if header != PROVIDER_SECTION && header != KEY_SECTION {
                    if sections.iter().any(|s| s.os == header) {
                        return Err(CatalogError::LinkFormat(format!(
                            "line {line_no}: duplicate section [{header}]"
                        )));
                    }
                    sections.push(OsSection {
                        os: header.clone(),
                        entries: Vec::new(),
                    });
                }
                current = Some(header);
                open_entry = None;
                continue;
            }

            let (key, value) = trimmed.split_once('=').ok_or_else(|| {
                CatalogError::LinkFormat(format!("line {line_no}: expected 'key = value'"))
            })?;
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match current.as_deref() {
                None => {
                    return Err(CatalogError::LinkFormat(format!(
                        "line {line_no}: entry outside of any section"
                    )))
                }
                Some(PROVIDER_SECTION) if key == "name" => name = Some(value.to_string()),
                Some(KEY_SECTION) if key == "fingerprint" => fingerprint = Some(value.to_string()),
                Some(PROVIDER_SECTION) | Some(KEY_SECTION) => {
                    // Unknown metadata keys are tolerated.
                    open_entry = None;
                }
                Some(_) => {
                    let s = sections.len() - 1;
                    let release = Release::parse(value).map_err(|e| at_line(line_no, e))?;
                    sections[s].append(&key, release);
                    let e = sections[s]
                        .entries
                        .iter()
                        .position(|entry| entry.locale == key)
                        .unwrap_or(sections[s].entries.len() - 1);
                    open_entry = Some((s, e));
                }
            }
        }

        let name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CatalogError::LinkFormat("missing [provider] name".to_string()))?;
        let fingerprint = fingerprint
            .filter(|f| !f.is_empty())
            .ok_or_else(|| CatalogError::LinkFormat("missing [key] fingerprint".to_string()))?;

        Ok(Self {
            name,
            fingerprint,
            sections,
        })
    }

    /// Render to the on-disk form.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("[{PROVIDER_SECTION}]\nname = {}\n\n", self.name));
        out.push_str(&format!("[{KEY_SECTION}]\nfingerprint = {}\n", self.fingerprint));

        for section in &self.sections {
            out.push_str(&format!("\n[{}]\n", section.os));
            for entry in &section.entries {
                let mut releases = entry.history.iter();
                if let Some(first) = releases.next() {
                    out.push_str(&format!("{} = {}\n", entry.locale, first.render()));
                }
                for release in releases {
                    out.push_str(&format!("\t{}\n", release.render()));
                }
            }
        }
        out
    }
}

fn at_line(line_no: usize, err: CatalogError) -> CatalogError {
    match err {
        CatalogError::LinkFormat(msg) => CatalogError::LinkFormat(format!("line {line_no}: {msg}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[provider]
name = Acme

[key]
fingerprint = ABCD 1234

[windows]
en = https://x/w.exe$https://x/w.exe.asc$aaa$

[linux]
# two architectures per release
en = https://x/l32$https://x/l32.asc$b32$,https://x/l64$https://x/l64.asc$b64$
\thttps://x/m32$https://x/m32.asc$c32$,https://x/m64$https://x/m64.asc$c64$
es = https://x/es$https://x/es.asc$ddd$

[osx]
";

    #[test]
    fn parse_reads_metadata_and_sections() {
        let file = CatalogFile::parse(SAMPLE).unwrap();
        assert_eq!(file.name, "Acme");
        assert_eq!(file.fingerprint, "ABCD 1234");
        let os: Vec<&str> = file.sections.iter().map(|s| s.os.as_str()).collect();
        assert_eq!(os, vec!["windows", "linux", "osx"]);
        assert!(file.section("osx").unwrap().entries.is_empty());
    }

    #[test]
    fn continuation_lines_extend_history() {
        let file = CatalogFile::parse(SAMPLE).unwrap();
        let en = file.section("linux").unwrap().entry("en").unwrap();
        assert_eq!(en.history.len(), 2);

        let latest = en.latest().unwrap();
        assert_eq!(latest.records.len(), 2);
        assert_eq!(latest.records[0].binary_url, "https://x/m32");
        assert_eq!(latest.records[1].sha256, "c64");
    }

    #[test]
    fn render_then_parse_preserves_content() {
        let file = CatalogFile::parse(SAMPLE).unwrap();
        let reparsed = CatalogFile::parse(&file.render()).unwrap();
        assert_eq!(file, reparsed);
    }

    #[test]
    fn skeleton_has_one_empty_section_per_os() {
        let os = vec!["windows".to_string(), "linux".to_string()];
        let file = CatalogFile::skeleton("Acme", "ABCD", &os);
        let rendered = file.render();
        assert!(rendered.contains("[windows]"));
        assert!(rendered.contains("[linux]"));
        assert!(rendered.contains("fingerprint = ABCD"));
        assert_eq!(CatalogFile::parse(&rendered).unwrap(), file);
    }

    #[test]
    fn release_parse_accepts_missing_trailing_delimiter() {
        let release = Release::parse("http://a$http://a.asc$deadbeef").unwrap();
        assert_eq!(release.records[0].sha256, "deadbeef");
        assert_eq!(release.render(), "http://a$http://a.asc$deadbeef$");
    }

    #[test]
    fn release_parse_rejects_bad_shapes() {
        for bad in [
            "",
            "http://a",
            "http://a$http://a.asc$",
            "$http://a.asc$deadbeef$",
            "http://a$http://a.asc$deadbeef$extra$",
            "http://a$http://a.asc$deadbeef$,",
        ] {
            assert!(
                matches!(Release::parse(bad), Err(CatalogError::LinkFormat(_))),
                "expected format error for {bad:?}"
            );
        }
    }

    #[test]
    fn parse_rejects_missing_metadata() {
        let err = CatalogFile::parse("[key]\nfingerprint = A\n").unwrap_err();
        assert!(err.to_string().contains("name"));

        let err = CatalogFile::parse("[provider]\nname = A\n").unwrap_err();
        assert!(err.to_string().contains("fingerprint"));
    }

    #[test]
    fn parse_reports_line_numbers() {
        let content = "[provider]\nname = A\n[key]\nfingerprint = B\n[linux]\nen = broken\n";
        let err = CatalogFile::parse(content).unwrap_err();
        assert!(err.to_string().contains("line 6"), "{err}");
    }

    #[test]
    fn parse_rejects_orphan_continuation() {
        let content = "[provider]\nname = A\n\tstray$x$y$\n";
        assert!(CatalogFile::parse(content).is_err());
    }

    #[test]
    fn append_creates_then_extends_entry() {
        let mut section = OsSection {
            os: "linux".to_string(),
            entries: Vec::new(),
        };
        section.append("EN", Release::parse("a$b$c$").unwrap());
        section.append("en", Release::parse("d$e$f$").unwrap());

        assert_eq!(section.entries.len(), 1);
        assert_eq!(section.entries[0].locale, "en");
        assert_eq!(section.entry("en").unwrap().history.len(), 2);
    }
}
