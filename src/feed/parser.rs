use chrono::{DateTime, FixedOffset};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// RFC 1123 with a numeric zone, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`.
pub const PUB_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Everything after the `"Mon, "` prefix. The weekday is checked by name only.
const DATE_BODY_FORMAT: &str = "%d %b %Y %H:%M:%S %z";

/// Byte shape of the date body: `0` is a digit, `a` a letter, `+` a sign.
const DATE_BODY_SHAPE: &[u8] = b"00 aaa 0000 00:00:00 +0000";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// The body is not a well-formed RSS 2.0 document.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Invalid RSS document: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid RSS document: <{0}> is never closed")]
    Unclosed(String),

    #[error("Invalid RSS document: no <channel> element")]
    MissingChannel,
}

/// An item's publication date is not in [`PUB_DATE_FORMAT`].
#[derive(Debug, Error)]
pub enum DateFormatError {
    #[error("Unrecognized publication date {value:?}, expected the layout {layout:?}", layout = PUB_DATE_FORMAT)]
    Layout { value: String },

    #[error("Unrecognized publication date {value:?}: {source}")]
    Invalid {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl DateFormatError {
    /// The raw `pubDate` text that was rejected.
    pub fn value(&self) -> &str {
        match self {
            DateFormatError::Layout { value } | DateFormatError::Invalid { value, .. } => value,
        }
    }
}

/// One fetch's worth of a feed: channel metadata plus its items in
/// document order. Lives only for the duration of a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub entries: Vec<Entry>,
}

/// A single `<item>`, not yet checked against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub pub_date: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    Language,
    PubDate,
}

impl Field {
    /// Only unprefixed elements count: `<atom:link>` is not `<link>`.
    fn of(e: &BytesStart<'_>) -> Option<Self> {
        if e.name().prefix().is_some() {
            return None;
        }
        match e.local_name().as_ref() {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" => Some(Field::Description),
            b"language" => Some(Field::Language),
            b"pubDate" => Some(Field::PubDate),
            _ => None,
        }
    }
}

/// Text children of a `<channel>` or an `<item>`. The first non-empty
/// occurrence of each element wins.
#[derive(Debug, Default)]
struct TextFields {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    language: Option<String>,
    pub_date: Option<String>,
}

impl TextFields {
    fn set(&mut self, field: Field, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Description => &mut self.description,
            Field::Language => &mut self.language,
            Field::PubDate => &mut self.pub_date,
        };
        if slot.is_none() {
            *slot = Some(text.to_string());
        }
    }

    fn into_entry(self) -> Entry {
        Entry {
            title: self.title.unwrap_or_default(),
            link: self.link.unwrap_or_default(),
            description: self.description,
            pub_date: self.pub_date,
        }
    }
}

// Element depths below the document root: <rss> is 1, so <channel> is 2,
// channel fields and <item> are 3, item fields are 4.
const CHANNEL_DEPTH: usize = 2;
const ITEM_DEPTH: usize = 3;

/// Decode an RSS 2.0 body.
///
/// The root element name is not checked and unknown or namespaced elements
/// are skipped. Only the first `<channel>` is read.
pub fn parse_document(bytes: &[u8]) -> Result<FetchedDocument, FormatError> {
    let mut reader = Reader::from_reader(bytes);

    let mut buf = Vec::new();
    // Open element names, used for depth and for reporting truncated bodies
    let mut open: Vec<String> = Vec::new();

    let mut channel: Option<TextFields> = None;
    let mut in_channel = false;
    let mut item: Option<TextFields> = None;
    let mut entries = Vec::new();
    let mut capture: Option<(Field, String)> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                open.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                let depth = open.len();

                if depth == CHANNEL_DEPTH && is_plain(&e, b"channel") && channel.is_none() {
                    channel = Some(TextFields::default());
                    in_channel = true;
                } else if in_channel && depth == ITEM_DEPTH && is_plain(&e, b"item") {
                    item = Some(TextFields::default());
                } else if (in_channel && item.is_none() && depth == ITEM_DEPTH)
                    || (item.is_some() && depth == ITEM_DEPTH + 1)
                {
                    capture = Field::of(&e).map(|field| (field, String::new()));
                }
            }
            Event::Empty(e) => {
                let depth = open.len() + 1;
                if depth == CHANNEL_DEPTH && is_plain(&e, b"channel") && channel.is_none() {
                    channel = Some(TextFields::default());
                } else if in_channel && depth == ITEM_DEPTH && is_plain(&e, b"item") {
                    entries.push(TextFields::default().into_entry());
                }
            }
            Event::Text(e) => {
                if let Some((_, text)) = capture.as_mut() {
                    text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some((_, text)) = capture.as_mut() {
                    text.push_str(&e.decode().map_err(quick_xml::Error::from)?);
                }
            }
            Event::End(_) => {
                let depth = open.len();
                if let Some((field, text)) = capture.take() {
                    // Text of markup nested in a field is kept; only the
                    // field's own closing tag ends the capture
                    let field_depth = if item.is_some() { ITEM_DEPTH + 1 } else { ITEM_DEPTH };
                    if depth == field_depth {
                        match (item.as_mut(), channel.as_mut()) {
                            (Some(fields), _) | (None, Some(fields)) => fields.set(field, &text),
                            (None, None) => {}
                        }
                    } else {
                        capture = Some((field, text));
                    }
                } else if depth == ITEM_DEPTH && item.is_some() {
                    if let Some(fields) = item.take() {
                        entries.push(fields.into_entry());
                    }
                } else if depth == CHANNEL_DEPTH && in_channel {
                    in_channel = false;
                }
                open.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(name) = open.pop() {
        return Err(FormatError::Unclosed(name));
    }

    let channel = channel.ok_or(FormatError::MissingChannel)?;
    Ok(FetchedDocument {
        title: channel.title.unwrap_or_default(),
        link: channel.link.unwrap_or_default(),
        description: channel.description,
        language: channel.language,
        entries,
    })
}

fn is_plain(e: &BytesStart<'_>, local: &[u8]) -> bool {
    e.name().prefix().is_none() && e.local_name().as_ref() == local
}

/// Parse an item's `pubDate` using the single accepted layout,
/// `Mon, 02 Jan 2006 15:04:05 -0700`.
///
/// The weekday must be a valid English abbreviation but is not checked
/// against the date. The day is always two digits and the zone a numeric
/// `+hhmm`/`-hhmm` offset.
pub fn parse_pub_date(value: &str) -> Result<DateTime<FixedOffset>, DateFormatError> {
    let trimmed = value.trim();
    let layout_error = || DateFormatError::Layout {
        value: value.to_string(),
    };

    let body = trimmed
        .get(..3)
        .filter(|weekday| WEEKDAYS.contains(weekday))
        .and_then(|_| trimmed[3..].strip_prefix(", "))
        .ok_or_else(layout_error)?;

    if !matches_shape(body) {
        return Err(layout_error());
    }

    DateTime::parse_from_str(body, DATE_BODY_FORMAT).map_err(|source| DateFormatError::Invalid {
        value: value.to_string(),
        source,
    })
}

fn matches_shape(body: &str) -> bool {
    body.len() == DATE_BODY_SHAPE.len()
        && body.bytes().zip(DATE_BODY_SHAPE).all(|(c, &shape)| match shape {
            b'0' => c.is_ascii_digit(),
            b'a' => c.is_ascii_alphabetic(),
            b'+' => c == b'+' || c == b'-',
            literal => c == literal,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Example Blog</title>
    <link>https://blog.example.com/</link>
    <description>Notes and essays</description>
    <language>en-us</language>
    <atom:link href="https://blog.example.com/index.xml" rel="self" type="application/rss+xml"/>
    <item>
      <title>First</title>
      <link>https://blog.example.com/first</link>
      <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate>
      <description>&lt;p&gt;Hello&lt;/p&gt;</description>
    </item>
    <item>
      <title>Second</title>
      <link>https://blog.example.com/second</link>
      <pubDate>Tue, 03 Jan 2006 10:00:00 +0000</pubDate>
      <description></description>
    </item>
  </channel>
</rss>"#;

    // Channel header as WordPress writes it
    const WORDPRESS_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
    xmlns:content="http://purl.org/rss/1.0/modules/content/"
    xmlns:atom="http://www.w3.org/2005/Atom"
    xmlns:dc="http://purl.org/dc/elements/1.1/">
<channel>
    <title>Site Title</title>
    <atom:link href="https://wp.example.com/feed/" rel="self" type="application/rss+xml" />
    <link>https://wp.example.com</link>
    <description>Just another WordPress site</description>
    <lastBuildDate>Mon, 02 Jan 2006 15:04:05 +0000</lastBuildDate>
    <language>en-US</language>
    <item>
        <title>Hello world!</title>
        <link>https://wp.example.com/hello-world/</link>
        <dc:creator><![CDATA[admin]]></dc:creator>
        <pubDate>Mon, 02 Jan 2006 15:04:05 +0000</pubDate>
        <description><![CDATA[Welcome to WordPress.]]></description>
        <content:encoded><![CDATA[<p>Welcome to WordPress.</p>]]></content:encoded>
    </item>
</channel>
</rss>"#;

    #[test]
    fn test_parse_channel_metadata() {
        let doc = parse_document(SAMPLE_RSS.as_bytes()).unwrap();
        assert_eq!(doc.title, "Example Blog");
        assert_eq!(doc.link, "https://blog.example.com/");
        assert_eq!(doc.description.as_deref(), Some("Notes and essays"));
        assert_eq!(doc.language.as_deref(), Some("en-us"));
    }

    #[test]
    fn test_parse_items_in_document_order() {
        let doc = parse_document(SAMPLE_RSS.as_bytes()).unwrap();
        assert_eq!(
            doc.entries,
            vec![
                Entry {
                    title: "First".to_string(),
                    link: "https://blog.example.com/first".to_string(),
                    description: Some("<p>Hello</p>".to_string()),
                    pub_date: Some("Mon, 02 Jan 2006 15:04:05 -0700".to_string()),
                },
                Entry {
                    title: "Second".to_string(),
                    link: "https://blog.example.com/second".to_string(),
                    description: None,
                    pub_date: Some("Tue, 03 Jan 2006 10:00:00 +0000".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_parse_wordpress_header_with_atom_link_before_link() {
        let doc = parse_document(WORDPRESS_RSS.as_bytes()).unwrap();
        assert_eq!(doc.title, "Site Title");
        assert_eq!(doc.link, "https://wp.example.com");
        assert_eq!(doc.language.as_deref(), Some("en-US"));
        assert_eq!(doc.entries.len(), 1);
        assert_eq!(doc.entries[0].link, "https://wp.example.com/hello-world/");
        assert_eq!(
            doc.entries[0].description.as_deref(),
            Some("Welcome to WordPress.")
        );
    }

    #[test]
    fn test_parse_atom_link_directly_after_link() {
        let rss = r#"<rss xmlns:atom="http://www.w3.org/2005/Atom"><channel>
            <title>T</title>
            <link>https://b.example/</link>
            <atom:link href="https://b.example/feed" rel="self"/>
            <item>
                <link>https://b.example/1</link>
                <atom:link href="https://b.example/1/comments" rel="replies"/>
            </item>
        </channel></rss>"#;
        let doc = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(doc.link, "https://b.example/");
        assert_eq!(doc.entries[0].link, "https://b.example/1");
    }

    #[test]
    fn test_parse_atom_link_with_text_is_ignored() {
        let rss = r#"<rss><channel><title>T</title>
            <item><atom:link>https://elsewhere/</atom:link><link>https://b.example/1</link></item>
        </channel></rss>"#;
        let doc = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(doc.entries[0].link, "https://b.example/1");
    }

    #[test]
    fn test_parse_item_title_does_not_leak_into_channel() {
        let rss = r#"<rss><channel>
            <item><title>Item</title><link>http://x/1</link></item>
            <title>Channel</title>
        </channel></rss>"#;
        let doc = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(doc.title, "Channel");
        assert_eq!(doc.entries[0].title, "Item");
    }

    #[test]
    fn test_parse_empty_channel() {
        let doc = parse_document(
            br#"<?xml version="1.0"?><rss version="2.0"><channel><title>Empty</title></channel></rss>"#,
        )
        .unwrap();
        assert_eq!(doc.title, "Empty");
        assert!(doc.entries.is_empty());
    }

    #[test]
    fn test_parse_cdata_description() {
        let rss = r#"<rss><channel><title>T</title>
            <item><title>A</title><link>http://x/1</link>
            <description><![CDATA[<b>bold</b>]]></description></item>
        </channel></rss>"#;
        let doc = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(doc.entries[0].description.as_deref(), Some("<b>bold</b>"));
        assert!(doc.entries[0].pub_date.is_none());
    }

    #[test]
    fn test_parse_malformed_xml() {
        assert!(parse_document(b"<not valid xml").is_err());
        assert!(parse_document(b"<rss><channel></item></channel></rss>").is_err());
    }

    #[test]
    fn test_parse_truncated_document() {
        assert!(matches!(
            parse_document(b"<rss><channel><title>T</title>"),
            Err(FormatError::Unclosed(_))
        ));
    }

    #[test]
    fn test_parse_missing_channel() {
        assert!(matches!(
            parse_document(br#"<rss version="2.0"></rss>"#),
            Err(FormatError::MissingChannel)
        ));
    }

    #[test]
    fn test_parse_pub_date_with_offset() {
        let parsed = parse_pub_date("Mon, 02 Jan 2006 15:04:05 -0700").unwrap();
        let expected = Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), expected);
        assert_eq!(parsed.offset().local_minus_utc(), -7 * 3600);
    }

    #[test]
    fn test_parse_pub_date_trims_whitespace() {
        assert!(parse_pub_date("  Mon, 02 Jan 2006 15:04:05 +0000\n").is_ok());
    }

    #[test]
    fn test_parse_pub_date_ignores_wrong_weekday() {
        // 2 Jan 2006 was a Monday
        let parsed = parse_pub_date("Tue, 02 Jan 2006 15:04:05 -0700").unwrap();
        let expected = parse_pub_date("Mon, 02 Jan 2006 15:04:05 -0700").unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parse_pub_date_rejects_unknown_weekday() {
        let err = parse_pub_date("Xyz, 02 Jan 2006 15:04:05 -0700").unwrap_err();
        assert!(matches!(err, DateFormatError::Layout { .. }));
    }

    #[test]
    fn test_parse_pub_date_rejects_single_digit_day() {
        let err = parse_pub_date("Mon, 2 Jan 2006 15:04:05 -0700").unwrap_err();
        assert!(matches!(err, DateFormatError::Layout { .. }));
    }

    #[test]
    fn test_parse_pub_date_rejects_colon_offset() {
        let err = parse_pub_date("Mon, 02 Jan 2006 15:04:05 -07:00").unwrap_err();
        assert!(matches!(err, DateFormatError::Layout { .. }));
    }

    #[test]
    fn test_parse_pub_date_rejects_impossible_date() {
        let err = parse_pub_date("Mon, 31 Feb 2006 15:04:05 +0000").unwrap_err();
        assert!(matches!(err, DateFormatError::Invalid { .. }));
    }

    #[test]
    fn test_parse_pub_date_rejects_other_formats() {
        for value in [
            "2006-01-02T15:04:05Z",
            "Mon, 02 Jan 2006 15:04:05 GMT",
            "02 Jan 2006",
            "Mon 02 Jan 2006 15:04:05 -0700",
            "",
        ] {
            let err = parse_pub_date(value).unwrap_err();
            assert_eq!(err.value(), value);
        }
    }

    proptest! {
        #[test]
        fn prop_pub_date_accepts_any_instant_and_offset(
            secs in 0i64..4_102_444_800,
            offset_minutes in -720i32..=840,
        ) {
            let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap();
            let instant = offset.timestamp_opt(secs, 0).unwrap();
            let rendered = instant.format(PUB_DATE_FORMAT).to_string();

            let parsed = parse_pub_date(&rendered).unwrap();
            prop_assert_eq!(parsed.timestamp(), secs);
        }
    }
}
