//! Attachment placement for relayed list messages.
//!
//! The provider stores attachments separately and hands us a content-id map
//! (`<token>` → attachment URL). An attachment is sent inline only when the
//! HTML body references its token as `cid:<token>`; those references are
//! rewritten to the filename so the outbound message points at the
//! re-attached file. Placement is always decided against the body as
//! received, never against a partially rewritten one.

use std::ops::Range;

use tracing::debug;

use crate::types::{Attachment, Placement, ResolvedAttachment};

/// URL scheme of inline content references.
const CID_SCHEME: &str = "cid:";

/// Rewritten HTML body and the placement of every attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub html: String,
    pub attachments: Vec<ResolvedAttachment>,
}

/// Classify attachments as inline or standalone and rewrite the HTML body.
///
/// `content_ids` is in document order; when several tokens map to the same
/// URL the first one wins. Map entries pointing at unknown URLs are ignored.
pub fn resolve_attachments(
    attachments: &[Attachment],
    content_ids: &[(String, String)],
    html: &str,
) -> Resolution {
    let mut rewrites: Vec<(Range<usize>, &str)> = Vec::new();
    let mut resolved = Vec::with_capacity(attachments.len());

    for attachment in attachments {
        let token = content_ids
            .iter()
            .find(|(_, url)| *url == attachment.url)
            .map(|(key, _)| content_id_token(key))
            .filter(|token| !token.is_empty());

        let references = token
            .map(|token| cid_references(html, token))
            .unwrap_or_default();

        let placement = if references.is_empty() {
            Placement::Standalone
        } else {
            Placement::Inline
        };

        debug!(
            filename = %attachment.filename,
            placement = ?placement,
            has_content_id = token.is_some(),
            references = references.len(),
            "attachment_resolved"
        );

        rewrites.extend(
            references
                .into_iter()
                .map(|range| (range, attachment.filename.as_str())),
        );

        resolved.push(ResolvedAttachment {
            filename: attachment.filename.clone(),
            placement,
            source_url: attachment.url.clone(),
        });
    }

    Resolution {
        html: apply_rewrites(html, rewrites),
        attachments: resolved,
    }
}

/// Byte ranges of `token` wherever it appears as a whole `cid:<token>` reference.
fn cid_references(html: &str, token: &str) -> Vec<Range<usize>> {
    html.match_indices(token)
        .filter(|(start, _)| {
            start
                .checked_sub(CID_SCHEME.len())
                .and_then(|scheme_start| html.get(scheme_start..*start))
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case(CID_SCHEME))
        })
        .filter(|(start, _)| {
            html[start + token.len()..]
                .chars()
                .next()
                .map_or(true, ends_reference)
        })
        .map(|(start, _)| start..start + token.len())
        .collect()
}

/// Characters that may follow a `cid:` reference inside markup.
fn ends_reference(c: char) -> bool {
    c.is_whitespace() || matches!(c, '"' | '\'' | ')' | '>' | '&' | ';')
}

/// Replace each range with its filename; overlapping ranges keep the first.
fn apply_rewrites(html: &str, mut rewrites: Vec<(Range<usize>, &str)>) -> String {
    rewrites.sort_by_key(|(range, _)| range.start);

    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    for (range, filename) in rewrites {
        if range.start < cursor {
            continue;
        }
        out.push_str(&html[cursor..range.start]);
        out.push_str(filename);
        cursor = range.end;
    }

    out.push_str(&html[cursor..]);
    out
}

/// Strip one matching pair of `<…>` or `"…"` delimiters from a map key.
///
/// Keys without a matching pair are used unchanged.
pub fn content_id_token(key: &str) -> &str {
    let key = key.trim();
    let stripped = key
        .strip_prefix('<')
        .and_then(|k| k.strip_suffix('>'))
        .or_else(|| key.strip_prefix('"').and_then(|k| k.strip_suffix('"')));

    stripped.unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(url: &str, name: &str) -> Attachment {
        Attachment {
            url: url.to_string(),
            filename: name.to_string(),
        }
    }

    fn cid_map(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_referenced_content_id_is_inline() {
        let attachments = vec![attachment("https://x/a.png", "a.png")];
        let map = cid_map(&[("<cid1>", "https://x/a.png")]);

        let resolution =
            resolve_attachments(&attachments, &map, r#"<img src="cid:cid1">"#);

        assert_eq!(resolution.attachments[0].placement, Placement::Inline);
        assert_eq!(resolution.html, r#"<img src="cid:a.png">"#);
        assert!(!resolution.html.contains("cid1"));
    }

    #[test]
    fn test_unreferenced_content_id_is_standalone() {
        let attachments = vec![attachment("https://x/a.png", "a.png")];
        let map = cid_map(&[("<cid1>", "https://x/a.png")]);

        let resolution = resolve_attachments(&attachments, &map, "<p>No images</p>");

        assert_eq!(resolution.attachments[0].placement, Placement::Standalone);
        assert_eq!(resolution.html, "<p>No images</p>");
    }

    #[test]
    fn test_missing_map_is_standalone() {
        let attachments = vec![attachment("https://x/report.pdf", "report.pdf")];

        let resolution = resolve_attachments(&attachments, &[], "<p>See attached</p>");

        assert_eq!(
            resolution.attachments,
            vec![ResolvedAttachment {
                filename: "report.pdf".to_string(),
                placement: Placement::Standalone,
                source_url: "https://x/report.pdf".to_string(),
            }]
        );
    }

    #[test]
    fn test_map_entry_for_unknown_url_is_ignored() {
        let attachments = vec![attachment("https://x/a.png", "a.png")];
        let map = cid_map(&[("<ghost>", "https://x/ghost.png")]);

        let resolution =
            resolve_attachments(&attachments, &map, r#"<img src="cid:ghost">"#);

        assert_eq!(resolution.attachments.len(), 1);
        assert_eq!(resolution.attachments[0].placement, Placement::Standalone);
        assert_eq!(resolution.html, r#"<img src="cid:ghost">"#);
    }

    #[test]
    fn test_first_content_id_for_url_wins() {
        let attachments = vec![attachment("https://x/a.png", "a.png")];
        let map = cid_map(&[
            ("<first>", "https://x/a.png"),
            ("<second>", "https://x/a.png"),
        ]);

        let resolution = resolve_attachments(
            &attachments,
            &map,
            r#"<img src="cid:first"><img src="cid:second">"#,
        );

        assert_eq!(resolution.attachments[0].placement, Placement::Inline);
        assert_eq!(
            resolution.html,
            r#"<img src="cid:a.png"><img src="cid:second">"#
        );
    }

    #[test]
    fn test_every_occurrence_is_rewritten() {
        let attachments = vec![attachment("https://x/logo.png", "logo.png")];
        let map = cid_map(&[("<logo>", "https://x/logo.png")]);

        let resolution = resolve_attachments(
            &attachments,
            &map,
            r#"<img src="cid:logo"> <img src="cid:logo">"#,
        );

        assert_eq!(
            resolution.html,
            r#"<img src="cid:logo.png"> <img src="cid:logo.png">"#
        );
    }

    #[test]
    fn test_mixed_inline_and_standalone() {
        let attachments = vec![
            attachment("https://x/a.png", "a.png"),
            attachment("https://x/b.pdf", "b.pdf"),
        ];
        let map = cid_map(&[("<ii_a>", "https://x/a.png")]);

        let resolution =
            resolve_attachments(&attachments, &map, r#"<img src="cid:ii_a">"#);

        let placements: Vec<_> = resolution.attachments.iter().map(|a| a.placement).collect();
        assert_eq!(placements, vec![Placement::Inline, Placement::Standalone]);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let attachments = vec![
            attachment("https://x/a.png", "a.png"),
            attachment("https://x/b.pdf", "b.pdf"),
        ];
        let map = cid_map(&[("<cid1>", "https://x/a.png")]);
        let html = r#"<img src="cid:cid1">"#;

        let first = resolve_attachments(&attachments, &map, html);
        let second = resolve_attachments(&attachments, &map, html);

        assert_eq!(first, second);
    }

    #[test]
    fn test_token_prefix_of_another_token() {
        let attachments = vec![
            attachment("https://x/a.png", "a.png"),
            attachment("https://x/b.png", "b.png"),
        ];
        let map = cid_map(&[("<cid1>", "https://x/a.png"), ("<cid10>", "https://x/b.png")]);

        let resolution = resolve_attachments(
            &attachments,
            &map,
            r#"<img src="cid:cid1"><img src="cid:cid10">"#,
        );

        let placements: Vec<_> = resolution.attachments.iter().map(|a| a.placement).collect();
        assert_eq!(placements, vec![Placement::Inline, Placement::Inline]);
        assert_eq!(resolution.html, r#"<img src="cid:a.png"><img src="cid:b.png">"#);
    }

    #[test]
    fn test_token_in_body_text_is_left_alone() {
        let attachments = vec![attachment("https://x/a.png", "a.png")];
        let map = cid_map(&[("<cid1>", "https://x/a.png")]);

        let resolution = resolve_attachments(
            &attachments,
            &map,
            r#"<p>Ticket cid1 attached</p><img src='cid:cid1'>"#,
        );

        assert_eq!(resolution.attachments[0].placement, Placement::Inline);
        assert_eq!(
            resolution.html,
            "<p>Ticket cid1 attached</p><img src='cid:a.png'>"
        );
    }

    #[test]
    fn test_token_only_in_body_text_is_standalone() {
        let attachments = vec![attachment("https://x/a.png", "a.png")];
        let map = cid_map(&[("<cid1>", "https://x/a.png")]);

        let resolution =
            resolve_attachments(&attachments, &map, "<p>Ticket cid1 attached</p>");

        assert_eq!(resolution.attachments[0].placement, Placement::Standalone);
        assert_eq!(resolution.html, "<p>Ticket cid1 attached</p>");
    }

    #[test]
    fn test_cid_scheme_is_case_insensitive() {
        let attachments = vec![attachment("https://x/a.png", "a.png")];
        let map = cid_map(&[("<cid1>", "https://x/a.png")]);

        let resolution = resolve_attachments(&attachments, &map, r#"<img src="CID:cid1">"#);

        assert_eq!(resolution.attachments[0].placement, Placement::Inline);
        assert_eq!(resolution.html, r#"<img src="CID:a.png">"#);
    }

    #[test]
    fn test_shared_url_rewrites_reference_once() {
        let attachments = vec![
            attachment("https://x/a.png", "a.png"),
            attachment("https://x/a.png", "copy.png"),
        ];
        let map = cid_map(&[("<cid1>", "https://x/a.png")]);

        let resolution = resolve_attachments(&attachments, &map, r#"<img src="cid:cid1">"#);

        assert_eq!(resolution.html, r#"<img src="cid:a.png">"#);
    }

    #[test]
    fn test_content_id_token() {
        assert_eq!(content_id_token("<cid1>"), "cid1");
        assert_eq!(content_id_token("\"cid1\""), "cid1");
        assert_eq!(content_id_token("cid1"), "cid1");
        assert_eq!(content_id_token("<cid1"), "<cid1");
        assert_eq!(content_id_token("<cid1\""), "<cid1\"");
        assert_eq!(content_id_token("<>"), "");
    }

    #[test]
    fn test_empty_token_is_never_inline() {
        let attachments = vec![attachment("https://x/a.png", "a.png")];
        let map = cid_map(&[("<>", "https://x/a.png")]);

        let resolution = resolve_attachments(&attachments, &map, "<p>body</p>");

        assert_eq!(resolution.attachments[0].placement, Placement::Standalone);
        assert_eq!(resolution.html, "<p>body</p>");
    }
}
