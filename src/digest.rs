//! # Digest Assembler
//!
//! Renders categorized items into Telegram-HTML messages no longer than
//! `max_len` UTF-16 code units (the unit Telegram counts in).
//!
//! Layout of every message:
//!
//! ```text
//! 📰 <b>{title}</b>            (parts after the first: "{title} (n)")
//! 🗓 dd/mm/YYYY HH:MM
//!
//! 🚀 <b>Big Releases</b>       (one section per non-empty category)
//!
//! {marker} <b>{item title}</b>
//!    🔗 <a href='{url}'>Read More</a>
//!
//! 📣 Channel: {channel}
//! ```
//!
//! Splits happen only between items, never inside one, and never reorder.
//! A section that continues in the next message repeats its heading with "(cont.)".
//! An item too large for an empty message loses its description and then the tail
//! of its title; if even that cannot fit, it is left out.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};

use crate::categorize::{Categorized, Category};
use crate::ingest::types::SourceKind;
use crate::normalize::NewsItem;

/// One renderable message plus the exact items it carries, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMessage {
    pub part: usize,
    pub text: String,
    pub items: Vec<NewsItem>,
}

/// Length as counted by the transport.
pub fn message_len(s: &str) -> usize {
    s.encode_utf16().count()
}

#[derive(Debug, Clone)]
pub struct DigestAssembler {
    title: String,
    channel: String,
    max_len: usize,
    markers: HashMap<String, String>,
}

struct Draft {
    part: usize,
    body: String,
    body_len: usize,
    items: Vec<NewsItem>,
    open: Option<Category>,
}

impl Draft {
    fn new(part: usize) -> Self {
        Self {
            part,
            body: String::new(),
            body_len: 0,
            items: Vec::new(),
            open: None,
        }
    }

    fn push(&mut self, s: &str) {
        self.body.push_str(s);
        self.body_len += message_len(s);
    }
}

impl DigestAssembler {
    pub fn new(title: impl Into<String>, channel: impl Into<String>, max_len: usize) -> Self {
        Self {
            title: title.into(),
            channel: channel.into(),
            max_len,
            markers: HashMap::new(),
        }
    }

    /// Per-source emoji markers, keyed by source name.
    pub fn with_markers(mut self, markers: HashMap<String, String>) -> Self {
        self.markers = markers;
        self
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn assemble(
        &self,
        digest: &Categorized,
        generated_at: DateTime<FixedOffset>,
    ) -> Vec<DigestMessage> {
        let stamp = generated_at.format("%d/%m/%Y %H:%M").to_string();
        let footer = self.footer();
        let footer_len = message_len(&footer);

        let mut messages = Vec::new();
        let mut draft = Draft::new(1);

        for category in Category::ALL {
            let mut started = false;
            for item in digest.bucket(category) {
                let mut block = self.render_item(item);

                if !draft.items.is_empty() {
                    let section_len = if draft.open == Some(category) {
                        0
                    } else {
                        message_len(&section_heading(category, started))
                    };
                    let total = message_len(&self.header(draft.part, &stamp))
                        + draft.body_len
                        + section_len
                        + message_len(&block)
                        + footer_len;
                    if total > self.max_len {
                        let next = Draft::new(draft.part + 1);
                        let full = std::mem::replace(&mut draft, next);
                        messages.push(self.finish(full, &stamp, &footer));
                    }
                }

                if draft.items.is_empty() {
                    let room = self.max_len.saturating_sub(
                        message_len(&self.header(draft.part, &stamp))
                            + message_len(&section_heading(category, started))
                            + footer_len,
                    );
                    if message_len(&block) > room {
                        match self.render_shortened(item, room) {
                            Some(short) => {
                                tracing::warn!(
                                    target: "digest",
                                    key = %item.identity_key,
                                    max = self.max_len,
                                    "item does not fit an empty message, shortened"
                                );
                                block = short;
                            }
                            None => {
                                tracing::warn!(
                                    target: "digest",
                                    key = %item.identity_key,
                                    max = self.max_len,
                                    "item cannot fit any message, skipped"
                                );
                                continue;
                            }
                        }
                    }
                }

                if draft.open != Some(category) {
                    draft.push(&section_heading(category, started));
                    draft.open = Some(category);
                }
                draft.push(&block);
                draft.items.push(item.clone());
                started = true;
            }
        }

        if !draft.items.is_empty() {
            messages.push(self.finish(draft, &stamp, &footer));
        }

        if messages.len() > 1 {
            tracing::info!(target: "digest", parts = messages.len(), "digest split into several messages");
        }
        messages
    }

    fn finish(&self, draft: Draft, stamp: &str, footer: &str) -> DigestMessage {
        let mut text = self.header(draft.part, stamp);
        text.push_str(&draft.body);
        text.push_str(footer);
        DigestMessage {
            part: draft.part,
            text,
            items: draft.items,
        }
    }

    fn header(&self, part: usize, stamp: &str) -> String {
        let title = html_escape::encode_text(&self.title);
        if part <= 1 {
            format!("📰 <b>{title}</b>\n🗓 {stamp}\n")
        } else {
            format!("📰 <b>{title} ({part})</b>\n🗓 {stamp}\n")
        }
    }

    fn footer(&self) -> String {
        format!("\n📣 Channel: {}", html_escape::encode_text(&self.channel))
    }

    /// Render `item` within `room` units: drop the summary, then cut the title.
    /// `None` when even an empty title does not fit.
    fn render_shortened(&self, item: &NewsItem, room: usize) -> Option<String> {
        let mut short = item.clone();
        short.summary = None;
        let block = self.render_item(&short);
        if message_len(&block) <= room {
            return Some(block);
        }

        short.title = String::new();
        let overhead = message_len(&self.render_item(&short)) + "...".len();
        let mut left = room.checked_sub(overhead)?;
        let mut title = String::new();
        let mut buf = [0u8; 4];
        for c in item.title.chars() {
            let width = message_len(&html_escape::encode_text(c.encode_utf8(&mut buf)));
            if width > left {
                break;
            }
            left -= width;
            title.push(c);
        }
        short.title = format!("{}...", title.trim_end());
        Some(self.render_item(&short))
    }

    fn render_item(&self, item: &NewsItem) -> String {
        let marker = self
            .markers
            .get(&item.source_name)
            .map(String::as_str)
            .unwrap_or_else(|| item.source.default_marker());
        let title = html_escape::encode_text(&item.title);
        let url = html_escape::encode_single_quoted_attribute(&item.url);

        let mut line = format!("\n{marker} <b>{title}</b>");
        if item.source == SourceKind::GithubTrending {
            if let Some(summary) = &item.summary {
                line.push_str(" - ");
                line.push_str(&html_escape::encode_text(summary));
            }
        }
        line.push_str(&format!("\n   🔗 <a href='{url}'>Read More</a>\n"));
        line
    }
}

fn section_heading(category: Category, continued: bool) -> String {
    if continued {
        format!("\n{} <b>{} (cont.)</b>\n", category.emoji(), category.heading())
    } else {
        format!("\n{} <b>{}</b>\n", category.emoji(), category.heading())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::Categorizer;
    use crate::normalize::IdentityKey;
    use chrono::{TimeZone, Utc};

    fn at() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 6, 2, 9, 5, 0)
            .unwrap()
    }

    fn item(n: usize, score: i32, source: SourceKind) -> NewsItem {
        let url = format!("https://e.test/{n}");
        NewsItem {
            title: format!("Item number {n} about gpt"),
            identity_key: IdentityKey::from_url(&url).unwrap(),
            url,
            summary: Some("A repo".into()),
            source,
            source_name: "Feed".into(),
            published_at: Utc::now(),
            score,
            category: None,
        }
    }

    fn digest(items: Vec<NewsItem>) -> Categorized {
        Categorizer::new(5).categorize(items)
    }

    #[test]
    fn single_message_structure() {
        let asm = DigestAssembler::new("AI News Digest", "@ai_news", 4096)
            .with_markers(HashMap::from([("Feed".to_string(), "✨".to_string())]));
        let msgs = asm.assemble(
            &digest(vec![
                item(1, 9, SourceKind::ResearchBlog),
                item(2, 3, SourceKind::Community),
            ]),
            at(),
        );
        assert_eq!(msgs.len(), 1);
        let text = &msgs[0].text;
        assert!(text.starts_with("📰 <b>AI News Digest</b>\n🗓 02/06/2025 09:05\n"));
        assert!(text.ends_with("\n📣 Channel: @ai_news"));
        assert!(text.contains("✨ <b>Item number 1 about gpt</b>\n   🔗 <a href='https://e.test/1'>Read More</a>"));

        let big = text.find("🚀 <b>Big Releases</b>").unwrap();
        let flash = text.find("⚡ <b>Flash News</b>").unwrap();
        assert!(big < flash);
        assert!(!text.contains("Hot on GitHub"), "empty category must be omitted");
        assert_eq!(msgs[0].items.len(), 2);
    }

    #[test]
    fn trending_items_show_their_description() {
        let asm = DigestAssembler::new("D", "@c", 4096);
        let msgs = asm.assemble(&digest(vec![item(1, 3, SourceKind::GithubTrending)]), at());
        assert!(msgs[0].text.contains("⭐ <b>Item number 1 about gpt</b> - A repo"));
        assert!(msgs[0].text.contains("🔥 <b>Hot on GitHub</b>"));
    }

    #[test]
    fn titles_and_links_are_escaped() {
        let mut it = item(1, 3, SourceKind::Community);
        it.title = "<script> & co".into();
        it.url = "https://e.test/a?x='1'".into();
        let msgs = DigestAssembler::new("D", "@c", 4096).assemble(&digest(vec![it]), at());
        assert!(msgs[0].text.contains("&lt;script&gt; &amp; co"));
        assert!(!msgs[0].text.contains("x='1'"));
    }

    #[test]
    fn empty_digest_renders_nothing() {
        let msgs = DigestAssembler::new("D", "@c", 4096).assemble(&Categorized::default(), at());
        assert!(msgs.is_empty());
    }

    #[test]
    fn split_respects_limit_order_and_item_boundaries() {
        let items: Vec<NewsItem> = (0..8)
            .map(|n| {
                let source = if n % 3 == 0 { SourceKind::GithubTrending } else { SourceKind::Community };
                item(n, if n < 3 { 7 } else { 3 }, source)
            })
            .collect();
        let cat = digest(items);
        let expected: Vec<IdentityKey> = Category::ALL
            .iter()
            .flat_map(|c| cat.bucket(*c).iter().map(|i| i.identity_key.clone()))
            .collect();

        let asm = DigestAssembler::new("AI News Digest", "@ai_news", 400);
        let msgs = asm.assemble(&cat, at());
        assert!(msgs.len() >= 2, "expected a split, got {}", msgs.len());

        let mut seen = Vec::new();
        for (i, m) in msgs.iter().enumerate() {
            assert_eq!(m.part, i + 1);
            assert!(message_len(&m.text) <= 400, "part {} too long", m.part);
            assert!(m.text.ends_with("\n📣 Channel: @ai_news"));
            if i > 0 {
                assert!(m.text.starts_with(&format!("📰 <b>AI News Digest ({})</b>", i + 1)));
            }
            for it in &m.items {
                // the whole item block lives in this message
                assert!(m.text.contains(&format!("<a href='{}'>Read More</a>", it.url)));
                seen.push(it.identity_key.clone());
            }
        }
        assert_eq!(seen, expected);
    }

    #[test]
    fn continued_section_repeats_heading() {
        let items: Vec<NewsItem> = (0..6).map(|n| item(n, 3, SourceKind::Community)).collect();
        let msgs = DigestAssembler::new("D", "@c", 300).assemble(&digest(items), at());
        assert!(msgs.len() >= 2);
        assert!(msgs[0].text.contains("⚡ <b>Flash News</b>"));
        assert!(msgs[1].text.contains("⚡ <b>Flash News (cont.)</b>"));
    }

    #[test]
    fn oversized_item_is_shortened_to_fit() {
        let mut big = item(1, 3, SourceKind::Community);
        big.title = "x".repeat(500);
        let key = big.identity_key.clone();
        let msgs = DigestAssembler::new("D", "@c", 256)
            .assemble(&digest(vec![big, item(2, 3, SourceKind::Community)]), at());
        assert_eq!(msgs.len(), 2);
        for m in &msgs {
            assert!(message_len(&m.text) <= 256, "part {} too long", m.part);
            assert_eq!(m.items.len(), 1);
        }
        let carrier = msgs.iter().find(|m| m.items[0].identity_key == key).unwrap();
        assert!(carrier.text.contains("xxx...</b>"));
        assert!(carrier.text.contains("<a href='https://e.test/1'>Read More</a>"));
    }

    #[test]
    fn oversized_trending_item_loses_its_description_first() {
        let mut big = item(1, 3, SourceKind::GithubTrending);
        big.summary = Some("d".repeat(400));
        let msgs = DigestAssembler::new("D", "@c", 256).assemble(&digest(vec![big]), at());
        assert_eq!(msgs.len(), 1);
        assert!(message_len(&msgs[0].text) <= 256);
        assert!(msgs[0].text.contains("<b>Item number 1 about gpt</b>\n"));
        assert!(!msgs[0].text.contains("ddd"));
    }

    #[test]
    fn item_that_cannot_fit_any_message_is_skipped() {
        let msgs = DigestAssembler::new("D", "@c", 60)
            .assemble(&digest(vec![item(1, 3, SourceKind::Community)]), at());
        assert!(msgs.is_empty());
    }
}
