//! Message templates.
//!
//! Templates use `{name}` placeholders, with `{{` and `}}` for literal braces.
//! A [`TemplateSet`] is built once from configuration and never changes
//! afterwards; rendering an override that cannot be satisfied falls back to
//! the built-in default text.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}|\{|\}").unwrap());

/// Named arguments passed to a template.
pub type TemplateArgs = HashMap<&'static str, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    LiveStart,
    LiveEnd,
    LiveInfoFail,
    LiveInfoOffline,
    LiveInfoLive,
    CoverUnavailable,
}

impl TemplateName {
    pub const ALL: [TemplateName; 6] = [
        TemplateName::LiveStart,
        TemplateName::LiveEnd,
        TemplateName::LiveInfoFail,
        TemplateName::LiveInfoOffline,
        TemplateName::LiveInfoLive,
        TemplateName::CoverUnavailable,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            TemplateName::LiveStart => "live_start",
            TemplateName::LiveEnd => "live_end",
            TemplateName::LiveInfoFail => "live_info_fail",
            TemplateName::LiveInfoOffline => "live_info_offline",
            TemplateName::LiveInfoLive => "live_info_live",
            TemplateName::CoverUnavailable => "cover_unavailable",
        }
    }

    pub fn default_text(&self) -> &'static str {
        match self {
            TemplateName::LiveStart => {
                "{anchor_name} is live!\nTitle: {room_title}\nWatch: {room_url}"
            }
            TemplateName::LiveEnd => {
                "{anchor_name}'s stream has ended after {duration}."
            }
            TemplateName::LiveInfoFail => {
                "Room {room_id} ({anchor_name}): could not fetch live status, please try again later"
            }
            TemplateName::LiveInfoOffline => concat!(
                "Room: {room_id}\n",
                "Anchor: {anchor_name}\n",
                "Status: offline\n",
                "Title: {room_title}\n",
                "Last checked: {last_check_time}\n",
                "Link: {room_url}"
            ),
            TemplateName::LiveInfoLive => concat!(
                "Room: {room_id}\n",
                "Anchor: {anchor_name}\n",
                "Status: live\n",
                "Started: {start_time}\n",
                "Duration: {duration}\n",
                "Title: {room_title}\n",
                "Last checked: {last_check_time}\n",
                "Link: {room_url}"
            ),
            TemplateName::CoverUnavailable => "[cover unavailable]",
        }
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Per-template overrides. `None` keeps the built-in text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub live_start: Option<String>,
    pub live_end: Option<String>,
    pub live_info_fail: Option<String>,
    pub live_info_offline: Option<String>,
    pub live_info_live: Option<String>,
    pub cover_unavailable: Option<String>,
}

impl TemplateConfig {
    fn get(&self, name: TemplateName) -> Option<&str> {
        let value = match name {
            TemplateName::LiveStart => &self.live_start,
            TemplateName::LiveEnd => &self.live_end,
            TemplateName::LiveInfoFail => &self.live_info_fail,
            TemplateName::LiveInfoOffline => &self.live_info_offline,
            TemplateName::LiveInfoLive => &self.live_info_live,
            TemplateName::CoverUnavailable => &self.cover_unavailable,
        };
        value.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("missing argument {0:?}")]
    MissingArgument(String),
    #[error("unmatched brace at byte {0}")]
    UnmatchedBrace(usize),
}

/// Substitute `{name}` placeholders from `args`.
pub fn format_template(template: &str, args: &TemplateArgs) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        last = whole.end();

        match (whole.as_str(), caps.get(1)) {
            ("{{", _) => out.push('{'),
            ("}}", _) => out.push('}'),
            (_, Some(name)) => match args.get(name.as_str()) {
                Some(value) => out.push_str(value),
                None => return Err(TemplateError::MissingArgument(name.as_str().to_string())),
            },
            _ => return Err(TemplateError::UnmatchedBrace(whole.start())),
        }
    }

    out.push_str(&template[last..]);
    Ok(out)
}

/// Immutable set of template texts.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    overrides: HashMap<TemplateName, String>,
}

impl TemplateSet {
    pub fn from_config(config: &TemplateConfig) -> Self {
        let overrides = TemplateName::ALL
            .iter()
            .filter_map(|name| config.get(*name).map(|text| (*name, text.to_string())))
            .collect();
        Self { overrides }
    }

    /// Text used for `name`, override first.
    pub fn text(&self, name: TemplateName) -> &str {
        self.overrides
            .get(&name)
            .map(String::as_str)
            .unwrap_or_else(|| name.default_text())
    }

    pub fn is_overridden(&self, name: TemplateName) -> bool {
        self.overrides.contains_key(&name)
    }
}

/// Renders templates from a [`TemplateSet`]. Rendering never fails.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    templates: TemplateSet,
}

impl TemplateRenderer {
    pub fn new(templates: TemplateSet) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    pub fn render(&self, name: TemplateName, args: &TemplateArgs) -> String {
        match format_template(self.templates.text(name), args) {
            Ok(text) => return text,
            Err(e) if self.templates.is_overridden(name) => {
                warn!("Template {} failed to render ({}), using the default", name, e);
            }
            Err(e) => {
                error!("Default template {} failed to render: {}", name, e);
                return name.default_text().to_string();
            }
        }

        format_template(name.default_text(), args).unwrap_or_else(|e| {
            error!("Default template {} failed to render: {}", name, e);
            name.default_text().to_string()
        })
    }
}
