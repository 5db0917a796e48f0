// TV guide cache keyed by hour slot (YYYYMMDDHH, local time).
// Slots whose last second has passed are purged before every lookup; a miss
// re-reads the guide document and keeps only allow-listed channels starting inside the hour.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, Timelike};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::HubError;
use crate::models::{GuideChannel, GuideEntry};

const SLOT_KEY_LEN: usize = 10;

/// Parse an hour slot key. Anything but 10 digits forming a valid date-hour is rejected.
pub fn parse_slot(slot: &str) -> Result<NaiveDateTime, HubError> {
    if slot.len() != SLOT_KEY_LEN || !slot.bytes().all(|b| b.is_ascii_digit()) {
        return Err(HubError::validation("invalid date"));
    }
    NaiveDateTime::parse_from_str(&format!("{}0000", slot), "%Y%m%d%H%M%S")
        .map_err(|_| HubError::validation("invalid date"))
}

pub fn slot_key(t: NaiveDateTime) -> String {
    t.format("%Y%m%d%H").to_string()
}

/// Last second of the slot (HH:59:59).
fn slot_end(start: NaiveDateTime) -> NaiveDateTime {
    start + Duration::minutes(59) + Duration::seconds(59)
}

/// Guide timestamps: `YYYYMMDDHHMMSS` with an optional ` ±HHMM` offset; no offset means UTC.
pub fn parse_guide_time(s: &str) -> Option<DateTime<Local>> {
    let s = s.trim();
    let digits = s.get(..14)?;
    let naive = NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S").ok()?;
    let rest = s[14..].trim();
    let fixed: DateTime<FixedOffset> = if rest.is_empty() {
        naive.and_utc().fixed_offset()
    } else {
        DateTime::parse_from_str(&format!("{} {}", digits, rest), "%Y%m%d%H%M%S %z").ok()?
    };
    Some(fixed.with_timezone(&Local))
}

fn display_time(t: &DateTime<Local>) -> String {
    format!("{}:{:02}", t.hour(), t.minute())
}

/// Which programmes a parse keeps.
#[derive(Debug, Clone)]
pub struct GuideFilter {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub channels: Arc<Vec<GuideChannel>>,
    pub excluded_categories: Arc<Vec<String>>,
}

impl GuideFilter {
    fn channel_number(&self, name: &str) -> Option<u32> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.number)
    }
}

#[derive(Debug, Default)]
struct ProgrammeDraft {
    channel: String,
    number: u32,
    start: Option<DateTime<Local>>,
    stop: Option<DateTime<Local>>,
    title: Option<String>,
    description: Option<String>,
    categories: Vec<String>,
    image: Option<String>,
}

#[derive(Debug)]
enum Section {
    Outside,
    Channel { id: String, icon: Option<String> },
    Programme(ProgrammeDraft),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    Title,
    Description,
    Category,
}

#[derive(Debug, PartialEq, Eq)]
enum ParseState {
    Reading,
    Done,
}

/// Single pass over the document collecting channel icons and matching programmes;
/// the two collections are joined once the document is fully consumed.
struct GuideVisitor<'f> {
    filter: &'f GuideFilter,
    section: Section,
    text_field: Option<TextField>,
    text: String,
    icons: HashMap<String, String>,
    programmes: Vec<ProgrammeDraft>,
    state: ParseState,
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, HubError> {
    match e.try_get_attribute(name) {
        Ok(Some(a)) => a
            .unescape_value()
            .map(|v| Some(v.into_owned()))
            .map_err(|err| HubError::malformed(format!("guide attribute: {}", err))),
        Ok(None) => Ok(None),
        Err(err) => Err(HubError::malformed(format!("guide attribute: {}", err))),
    }
}

impl<'f> GuideVisitor<'f> {
    fn new(filter: &'f GuideFilter) -> Self {
        Self {
            filter,
            section: Section::Outside,
            text_field: None,
            text: String::new(),
            icons: HashMap::new(),
            programmes: Vec::new(),
            state: ParseState::Reading,
        }
    }

    fn open(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<(), HubError> {
        match e.local_name().as_ref() {
            b"channel" if !empty => {
                self.section = match attr(e, b"id")? {
                    Some(id) if self.filter.channel_number(&id).is_some() => {
                        Section::Channel { id, icon: None }
                    }
                    _ => Section::Outside,
                };
            }
            b"programme" if !empty => {
                self.section = Section::Outside;
                let Some(channel) = attr(e, b"channel")? else {
                    return Ok(());
                };
                let Some(number) = self.filter.channel_number(&channel) else {
                    return Ok(());
                };
                let start = attr(e, b"start")?.and_then(|s| parse_guide_time(&s));
                let in_slot = start.is_some_and(|s| {
                    let local = s.naive_local();
                    local >= self.filter.from && local < self.filter.to
                });
                if in_slot {
                    self.section = Section::Programme(ProgrammeDraft {
                        channel,
                        number,
                        start,
                        stop: attr(e, b"stop")?.and_then(|s| parse_guide_time(&s)),
                        ..Default::default()
                    });
                }
            }
            b"icon" => {
                let src = attr(e, b"src")?;
                match &mut self.section {
                    Section::Channel { icon, .. } if icon.is_none() => *icon = src,
                    Section::Programme(p) if p.image.is_none() => p.image = src,
                    _ => {}
                }
            }
            b"title" | b"desc" | b"category" if !empty => {
                if matches!(self.section, Section::Programme(_)) {
                    self.text_field = Some(match e.local_name().as_ref() {
                        b"title" => TextField::Title,
                        b"desc" => TextField::Description,
                        _ => TextField::Category,
                    });
                    self.text.clear();
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"title" | b"desc" | b"category" => {
                let Some(field) = self.text_field.take() else {
                    return;
                };
                let text = std::mem::take(&mut self.text);
                if let Section::Programme(p) = &mut self.section {
                    match field {
                        TextField::Title if p.title.is_none() => p.title = Some(text),
                        TextField::Description if p.description.is_none() => {
                            p.description = Some(text)
                        }
                        TextField::Category => p.categories.push(text),
                        _ => {}
                    }
                }
            }
            b"channel" => {
                if let Section::Channel { id, icon } =
                    std::mem::replace(&mut self.section, Section::Outside)
                    && let Some(icon) = icon.filter(|i| !i.is_empty())
                {
                    self.icons.entry(id).or_insert(icon);
                }
            }
            b"programme" => {
                if let Section::Programme(p) =
                    std::mem::replace(&mut self.section, Section::Outside)
                {
                    let excluded = p
                        .categories
                        .iter()
                        .any(|c| self.filter.excluded_categories.contains(c));
                    if !excluded {
                        self.programmes.push(p);
                    }
                }
            }
            _ => {}
        }
    }

    fn visit(&mut self, event: Event<'_>) -> Result<(), HubError> {
        match event {
            Event::Start(e) => self.open(&e, false)?,
            Event::Empty(e) => self.open(&e, true)?,
            Event::End(e) => self.close(e.local_name().as_ref()),
            Event::Text(t) if self.text_field.is_some() => {
                let s = t
                    .unescape()
                    .map_err(|err| HubError::malformed(format!("guide text: {}", err)))?;
                self.text.push_str(&s);
            }
            Event::CData(c) if self.text_field.is_some() => {
                self.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Event::Eof => self.state = ParseState::Done,
            _ => {}
        }
        Ok(())
    }

    /// Joins programmes with channel icons. Only valid after the document was fully read.
    fn finish(self) -> Result<Vec<GuideEntry>, HubError> {
        if self.state != ParseState::Done {
            return Err(HubError::malformed("guide document ended early"));
        }
        let icons = self.icons;
        Ok(self
            .programmes
            .into_iter()
            .filter_map(|p| {
                let start = p.start?;
                let stop = p.stop.unwrap_or(start);
                Some(GuideEntry {
                    channel_image: icons.get(&p.channel).cloned().unwrap_or_default(),
                    channel: p.channel,
                    start_display: display_time(&start),
                    stop_display: display_time(&stop),
                    start,
                    stop,
                    title: p.title.unwrap_or_default(),
                    categories: p.categories,
                    description: p.description.unwrap_or_default(),
                    image: p.image.unwrap_or_default(),
                    channel_number: p.number,
                })
            })
            .collect())
    }
}

/// Streams through a guide document and returns the entries matching `filter`.
pub fn parse_guide(doc: &str, filter: &GuideFilter) -> Result<Vec<GuideEntry>, HubError> {
    let mut reader = Reader::from_str(doc);
    let mut visitor = GuideVisitor::new(filter);
    while visitor.state == ParseState::Reading {
        let event = reader
            .read_event()
            .map_err(|e| HubError::malformed(format!("guide xml: {}", e)))?;
        visitor.visit(event)?;
    }
    visitor.finish()
}

pub struct ProgramGuideCache {
    source: PathBuf,
    channels: Arc<Vec<GuideChannel>>,
    excluded_categories: Arc<Vec<String>>,
    entries: Mutex<HashMap<String, Vec<GuideEntry>>>,
}

impl ProgramGuideCache {
    pub fn new(
        source: impl Into<PathBuf>,
        channels: Vec<GuideChannel>,
        excluded_categories: Vec<String>,
    ) -> Self {
        Self {
            source: source.into(),
            channels: Arc::new(channels),
            excluded_categories: Arc::new(excluded_categories),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn lookup(&self, slot: &str) -> Result<Vec<GuideEntry>, HubError> {
        self.lookup_at(slot, Local::now().naive_local()).await
    }

    /// Lookup with an explicit local "now".
    #[instrument(skip(self), fields(component = "guide", operation = "lookup"))]
    pub async fn lookup_at(
        &self,
        slot: &str,
        now: NaiveDateTime,
    ) -> Result<Vec<GuideEntry>, HubError> {
        let from = parse_slot(slot)?;

        {
            let mut entries = self.entries.lock().await;
            let before = entries.len();
            entries.retain(|key, _| parse_slot(key).is_ok_and(|start| slot_end(start) >= now));
            if entries.len() != before {
                debug!(purged = before - entries.len(), "expired guide slots purged");
            }

            if let Some(hit) = entries.get(slot) {
                return Ok(hit.clone());
            }
        }

        // Lock released while reading and parsing.
        let doc = tokio::fs::read_to_string(&self.source).await.map_err(|e| {
            HubError::malformed(format!("guide source {}: {}", self.source.display(), e))
        })?;
        let filter = GuideFilter {
            from,
            to: from + Duration::hours(1),
            channels: self.channels.clone(),
            excluded_categories: self.excluded_categories.clone(),
        };
        let list = tokio::task::spawn_blocking(move || parse_guide(&doc, &filter))
            .await
            .map_err(|e| HubError::malformed(format!("guide parse task: {}", e)))??;

        debug!(entries = list.len(), "guide slot parsed");
        if slot_end(from) < now {
            return Ok(list);
        }
        // A concurrent miss on the same slot may have stored first; keep that one.
        let mut entries = self.entries.lock().await;
        Ok(entries.entry(slot.to_string()).or_insert(list).clone())
    }

    /// Slots currently held in the cache.
    pub async fn cached_slots(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}
