//! Line-oriented console front end: stdin commands in, feed changes out.

use crate::dashboard::{Command, DashboardObserver, DashboardView};
use crate::feed::{Item, PagingState, Viewport};
use crate::settings::SettingsForm;
use crate::view::{FeedStatus, LiveStatus, SaveStatus, ViewChange};
use chrono::{DateTime, Utc};
use std::io::Write;
use thiserror::Error;

pub const HELP: &str = "\
commands:
  min-price <n> | max-price <n> | min-sqm <n>   (empty value clears the bound)
  city add|remove <name>
  agency add|remove <id>
  notify on|off
  save | retry | more | refresh | quit";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// Turns input lines into dashboard commands.
///
/// Keeps its own copy of the settings form so that each edit can be sent as
/// a complete form.
#[derive(Debug, Clone)]
pub struct CommandParser {
    form: SettingsForm,
}

impl CommandParser {
    pub fn new(form: SettingsForm) -> Self {
        Self { form }
    }

    pub fn form(&self) -> &SettingsForm {
        &self.form
    }

    /// Parse one line. Blank lines and `help` yield `Ok(None)`.
    pub fn parse(&mut self, line: &str) -> Result<Option<Command>, ParseError> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word {
            "" | "help" => return Ok(None),
            "min-price" => self.edit(|form| form.min_price = rest.to_string()),
            "max-price" => self.edit(|form| form.max_price = rest.to_string()),
            "min-sqm" => self.edit(|form| form.min_sqm = rest.to_string()),
            "city" => {
                let (action, name) = split_action(rest)
                    .ok_or(ParseError::Usage("city add|remove <name>"))?;
                match action {
                    "add" => self.edit(|form| {
                        form.add_city(name);
                    }),
                    "remove" => self.edit(|form| {
                        form.remove_city(name);
                    }),
                    _ => return Err(ParseError::Usage("city add|remove <name>")),
                }
            }
            "agency" => {
                let (action, id) = split_action(rest)
                    .ok_or(ParseError::Usage("agency add|remove <id>"))?;
                match action {
                    "add" => self.edit(|form| {
                        form.add_agency(id);
                    }),
                    "remove" => self.edit(|form| {
                        form.remove_agency(id);
                    }),
                    _ => return Err(ParseError::Usage("agency add|remove <id>")),
                }
            }
            "notify" => match rest {
                "on" => self.edit(|form| form.notifications_enabled = true),
                "off" => self.edit(|form| form.notifications_enabled = false),
                _ => return Err(ParseError::Usage("notify on|off")),
            },
            "save" => Command::SubmitSettings,
            "retry" => Command::RetrySave,
            "more" => Command::Scroll(Viewport::at_bottom(0)),
            "refresh" => Command::Refresh,
            "quit" | "exit" => Command::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }

    fn edit(&mut self, change: impl FnOnce(&mut SettingsForm)) -> Command {
        change(&mut self.form);
        Command::EditSettings(self.form.clone())
    }
}

fn split_action(rest: &str) -> Option<(&str, &str)> {
    let (action, value) = rest.split_once(char::is_whitespace)?;
    let value = value.trim();
    (!value.is_empty()).then_some((action, value))
}

/// Prints feed and status changes as plain text.
pub struct ConsoleObserver<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn print(&mut self, change: &ViewChange, view: &DashboardView<'_>) -> std::io::Result<()> {
        let now = Utc::now();
        match *change {
            ViewChange::FeedReplaced => {
                // A reset only has content once its page arrived
                if view.feed_status() == FeedStatus::Ready {
                    writeln!(self.out, "-- {} listings --", view.items().len())?;
                    for item in view.items() {
                        writeln!(self.out, "{}", format_item(item, now))?;
                    }
                }
            }
            ViewChange::Appended(count) => {
                let skip = view.items().len().saturating_sub(count);
                for item in view.items().iter().skip(skip) {
                    writeln!(self.out, "{}", format_item(item, now))?;
                }
            }
            ViewChange::Prepended(count) => {
                for item in view.items().iter().take(count) {
                    writeln!(self.out, "+ {}", format_item(item, now))?;
                }
            }
            ViewChange::NewItems(count) => {
                let noun = if count == 1 { "listing" } else { "listings" };
                writeln!(self.out, "** {} new {} **", count, noun)?;
            }
            ViewChange::LoadingMore(true) => writeln!(self.out, "loading more...")?,
            ViewChange::LoadingMore(false) => {}
            ViewChange::FeedStatus(FeedStatus::Loading) => {
                writeln!(self.out, "loading listings...")?
            }
            ViewChange::FeedStatus(FeedStatus::Empty) => {
                writeln!(self.out, "no listings match your filters")?
            }
            ViewChange::FeedStatus(FeedStatus::Error) => {
                writeln!(self.out, "could not load listings (type 'refresh' to retry)")?
            }
            ViewChange::FeedStatus(FeedStatus::Ready) => {}
            ViewChange::Paging(PagingState::EndReached) => {
                writeln!(self.out, "-- end of listings --")?
            }
            ViewChange::Paging(PagingState::LimitReached) => {
                writeln!(self.out, "-- refine your filters to see older listings --")?
            }
            ViewChange::Paging(PagingState::More) => {}
            ViewChange::Live(LiveStatus::ConnectionLost) => {
                writeln!(self.out, "connection lost (type 'refresh' to reconnect)")?
            }
            ViewChange::Live(LiveStatus::Live) => writeln!(self.out, "live")?,
            ViewChange::SaveStatus(SaveStatus::Saving) => writeln!(self.out, "saving...")?,
            ViewChange::SaveStatus(SaveStatus::Success) => writeln!(self.out, "saved")?,
            ViewChange::SaveStatus(SaveStatus::Error) => {
                writeln!(self.out, "saving failed (type 'retry')")?
            }
            ViewChange::SaveStatus(SaveStatus::Idle) => {}
        }
        self.out.flush()
    }
}

impl<W: Write + Send> DashboardObserver for ConsoleObserver<W> {
    fn notify(&mut self, change: &ViewChange, view: &DashboardView<'_>) {
        if let Err(e) = self.print(change, view) {
            tracing::warn!(error = %e, "Failed to write to console");
        }
    }
}

/// One-line summary of a listing.
pub fn format_item(item: &Item, now: DateTime<Utc>) -> String {
    let mut line = match (item.field_str("address"), item.field_str("city")) {
        (Some(address), Some(city)) => format!("{}, {}", address, city),
        (Some(address), None) => address.to_string(),
        (None, Some(city)) => city.to_string(),
        (None, None) => item.key().to_string(),
    };

    if let Some(price) = item.fields().get("price").and_then(|v| v.as_i64()) {
        if price >= 0 {
            line.push_str(&format!("  €{}", price));
        }
    }
    if let Some(sqm) = item.fields().get("sqm").and_then(|v| v.as_u64()) {
        if sqm > 0 {
            line.push_str(&format!("  {} m2", sqm));
        }
    }
    if let Some(agency) = item.field_str("agency") {
        line.push_str(&format!("  [{}]", agency));
    }
    if let Some(added) = item
        .field_str("date_added")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    {
        line.push_str(&format!("  {}", format_age(added.with_timezone(&Utc), now)));
    }
    line
}

/// Relative age such as `just now`, `5m ago`, `3h ago` or `2d ago`.
pub fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(then);
    if age.num_minutes() < 1 {
        "just now".to_string()
    } else if age.num_hours() < 1 {
        format!("{}m ago", age.num_minutes())
    } else if age.num_days() < 1 {
        format!("{}h ago", age.num_hours())
    } else {
        format!("{}d ago", age.num_days())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ItemKey;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_edits_carry_whole_form() {
        let mut parser = CommandParser::new(SettingsForm::default());

        parser.parse("min-price 800").unwrap();
        let command = parser.parse("city add Den Haag").unwrap();

        let Some(Command::EditSettings(form)) = command else {
            panic!("expected an edit, got {:?}", command);
        };
        assert_eq!(form.min_price, "800");
        assert_eq!(form.cities, vec!["Den Haag"]);
    }

    #[test]
    fn test_parse_clearing_a_bound() {
        let mut parser = CommandParser::new(SettingsForm::default());
        parser.parse("max-price 1500").unwrap();
        parser.parse("max-price").unwrap();
        assert_eq!(parser.form().max_price, "");
    }

    #[test]
    fn test_parse_remove_is_case_insensitive() {
        let mut parser = CommandParser::new(SettingsForm::default());
        parser.parse("city add Utrecht").unwrap();
        parser.parse("city remove utrecht").unwrap();
        assert!(parser.form().cities.is_empty());
    }

    #[test]
    fn test_parse_actions() {
        let mut parser = CommandParser::new(SettingsForm::default());
        assert_eq!(parser.parse("save"), Ok(Some(Command::SubmitSettings)));
        assert_eq!(parser.parse("retry"), Ok(Some(Command::RetrySave)));
        assert_eq!(parser.parse("refresh"), Ok(Some(Command::Refresh)));
        assert_eq!(parser.parse("  quit "), Ok(Some(Command::Quit)));
        assert!(matches!(parser.parse("more"), Ok(Some(Command::Scroll(_)))));
        assert_eq!(parser.parse(""), Ok(None));
    }

    #[test]
    fn test_parse_errors() {
        let mut parser = CommandParser::new(SettingsForm::default());
        assert_eq!(
            parser.parse("frobnicate"),
            Err(ParseError::Unknown("frobnicate".into()))
        );
        assert!(matches!(parser.parse("city add"), Err(ParseError::Usage(_))));
        assert!(matches!(parser.parse("city rename x"), Err(ParseError::Usage(_))));
        assert!(matches!(parser.parse("notify maybe"), Err(ParseError::Usage(_))));
        assert_eq!(parser.form(), &SettingsForm::default());
    }

    #[test]
    fn test_format_age() {
        let now = Utc.with_ymd_and_hms(2025, 10, 14, 12, 0, 0).unwrap();
        assert_eq!(format_age(now, now), "just now");
        assert_eq!(
            format_age(now - chrono::Duration::minutes(5), now),
            "5m ago"
        );
        assert_eq!(format_age(now - chrono::Duration::hours(3), now), "3h ago");
        assert_eq!(format_age(now - chrono::Duration::days(2), now), "2d ago");
    }

    #[test]
    fn test_format_item() {
        let now = Utc.with_ymd_and_hms(2025, 10, 14, 12, 0, 0).unwrap();
        let fields = json!({
            "url": "https://h.example/1",
            "address": "Oudegracht 1",
            "city": "Utrecht",
            "price": 1450,
            "agency": "vesteda",
            "date_added": "2025-10-14T09:00:00+00:00"
        });
        let serde_json::Value::Object(fields) = fields else {
            unreachable!()
        };
        let item = Item::from_fields(fields).unwrap();

        assert_eq!(
            format_item(&item, now),
            "Oudegracht 1, Utrecht  €1450  [vesteda]  3h ago"
        );

        let bare = Item::new(ItemKey::from("https://h.example/2"), Default::default());
        assert_eq!(format_item(&bare, now), "https://h.example/2");
    }
}
