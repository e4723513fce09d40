//! Configuration screen round trip.
//!
//! `open` hands the viewer a self-contained `data:` URL holding the whole
//! form. When the viewer closes it passes back whatever the form put after
//! `pebblejs://close#`: nothing on cancel, otherwise a JSON object that may
//! or may not still be percent-encoded depending on the shell.

use std::sync::Arc;

use happymac_weather::TemperatureUnit;
use serde_json::{Map, Value};

use crate::message::{keys, MessageSink};
use crate::settings::{Settings, SettingsStore, SettingsUpdate, Theme};

/// Presents a URL in a modal viewer.
pub trait ConfigViewer: Send + Sync {
    fn open_url(&self, url: &str);
}

pub struct ConfigurationBridge {
    settings: Arc<SettingsStore>,
    viewer: Arc<dyn ConfigViewer>,
    sink: Arc<dyn MessageSink>,
    weather_options: bool,
}

impl ConfigurationBridge {
    pub fn new(
        settings: Arc<SettingsStore>,
        viewer: Arc<dyn ConfigViewer>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            settings,
            viewer,
            sink,
            weather_options: false,
        }
    }

    /// Also offer the weather toggles on the form.
    pub fn with_weather_options(mut self, enabled: bool) -> Self {
        self.weather_options = enabled;
        self
    }

    /// Show the configuration form for the current settings.
    pub fn open(&self) {
        let html = render_form(&self.settings.snapshot(), self.weather_options);
        tracing::debug!("Opening configuration form ({} bytes)", html.len());
        self.viewer.open_url(&data_url(&html));
    }

    /// Handle the viewer's close event.
    ///
    /// Applies every field that validates and echoes exactly those fields to
    /// the device. Malformed or empty results change nothing.
    pub fn on_closed(&self, raw_result: Option<&str>) -> Option<SettingsUpdate> {
        let raw = match raw_result {
            Some(raw) if !raw.is_empty() => raw,
            _ => {
                tracing::debug!("Configuration cancelled");
                return None;
            }
        };

        let fields = decode_result(raw)?;
        let update = validate_result(&fields);
        if update.is_empty() {
            tracing::debug!("Configuration result had no usable fields");
            return None;
        }

        self.settings.set_many(update);
        self.sink.send(update.to_message());
        Some(update)
    }
}

impl std::fmt::Debug for ConfigurationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationBridge")
            .field("weather_options", &self.weather_options)
            .finish_non_exhaustive()
    }
}

/// Decode a close payload into a JSON object.
///
/// A payload starting with `{` is raw JSON; anything else is percent-decoded
/// first. Returns `None` on any failure or when the JSON is not an object.
pub fn decode_result(raw: &str) -> Option<Map<String, Value>> {
    let parsed = if raw.starts_with('{') {
        serde_json::from_str::<Value>(raw)
    } else {
        let decoded = match urlencoding::decode(raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!("Configuration result is not valid percent-encoding: {}", e);
                return None;
            }
        };
        serde_json::from_str::<Value>(&decoded)
    };

    match parsed {
        Ok(Value::Object(fields)) => Some(fields),
        Ok(other) => {
            tracing::debug!("Configuration result is not an object: {}", other);
            None
        }
        Err(e) => {
            tracing::debug!("Configuration result is not JSON: {}", e);
            None
        }
    }
}

/// Keep the fields whose values have the expected type.
pub fn validate_result(fields: &Map<String, Value>) -> SettingsUpdate {
    let theme = fields.get(keys::THEME).and_then(|value| {
        let code = value.as_f64().filter(|n| n.is_finite() && n.fract() == 0.0)?;
        Theme::try_from(code as i64).ok()
    });

    SettingsUpdate {
        theme,
        weather_enabled: fields.get(keys::WEATHER_ENABLED).and_then(Value::as_bool),
        weather_show_temp: fields.get(keys::WEATHER_SHOW_TEMP).and_then(Value::as_bool),
        weather_temp_unit: fields
            .get(keys::WEATHER_TEMP_UNIT)
            .and_then(Value::as_str)
            .and_then(TemperatureUnit::from_label),
    }
}

/// Wrap a document in a `data:` URL.
pub fn data_url(html: &str) -> String {
    format!("data:text/html,{}", urlencoding::encode(html))
}

const FORM_STYLE: &str = "body{font-family:Helvetica,Arial,sans-serif;background:#f6f2e9;color:#1b1b1b;margin:0;padding:20px;}\
h1{font-size:20px;margin:0 0 16px 0;}\
label{display:block;font-size:14px;margin:16px 0 8px 0;}\
label.check{display:flex;align-items:center;gap:8px;}\
select{width:100%;font-size:16px;padding:10px;border:1px solid #c7c1b6;border-radius:6px;background:#fff;}\
.row{margin-top:20px;display:flex;gap:10px;}\
button{flex:1;font-size:16px;padding:10px;border-radius:6px;border:1px solid #1b1b1b;background:#1b1b1b;color:#fff;}\
button.secondary{background:#fff;color:#1b1b1b;}";

/// Render the self-contained settings form.
pub fn render_form(settings: &Settings, weather_options: bool) -> String {
    let mut html = String::with_capacity(2048);
    html.push_str("<!DOCTYPE html><html><head>");
    html.push_str("<meta name='viewport' content='width=device-width, initial-scale=1'>");
    html.push_str("<title>HappyMac Settings</title>");
    html.push_str("<style>");
    html.push_str(FORM_STYLE);
    html.push_str("</style></head><body>");

    html.push_str("<h1>Theme</h1>");
    html.push_str("<label for='theme'>Choose a watchface theme</label>");
    html.push_str("<select id='theme'>");
    for theme in Theme::ALL {
        push_option(
            &mut html,
            &theme.code().to_string(),
            theme.label(),
            theme == settings.theme,
        );
    }
    html.push_str("</select>");

    if weather_options {
        html.push_str("<h1>Weather</h1>");
        push_checkbox(&mut html, "weather_enabled", "Show weather", settings.weather_enabled);
        push_checkbox(
            &mut html,
            "weather_show_temp",
            "Show temperature",
            settings.weather_show_temp,
        );
        html.push_str("<label for='weather_temp_unit'>Temperature unit</label>");
        html.push_str("<select id='weather_temp_unit'>");
        for unit in [TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit] {
            let text = match unit {
                TemperatureUnit::Celsius => "Celsius",
                TemperatureUnit::Fahrenheit => "Fahrenheit",
            };
            push_option(&mut html, unit.label(), text, unit == settings.weather_temp_unit);
        }
        html.push_str("</select>");
    }

    html.push_str("<div class='row'>");
    html.push_str("<button type='button' class='secondary' id='cancel'>Cancel</button>");
    html.push_str("<button type='button' id='save'>Save</button>");
    html.push_str("</div>");

    html.push_str("<script>");
    html.push_str("function el(id){return document.getElementById(id);}");
    html.push_str(
        "el('cancel').addEventListener('click',function(){document.location='pebblejs://close#';});",
    );
    html.push_str("el('save').addEventListener('click',function(){");
    html.push_str("var payload={theme:parseInt(el('theme').value,10)};");
    if weather_options {
        html.push_str("payload.WEATHER_ENABLED=el('weather_enabled').checked;");
        html.push_str("payload.WEATHER_SHOW_TEMP=el('weather_show_temp').checked;");
        html.push_str("payload.WEATHER_TEMP_UNIT=el('weather_temp_unit').value;");
    }
    html.push_str(
        "document.location='pebblejs://close#'+encodeURIComponent(JSON.stringify(payload));",
    );
    html.push_str("});");
    html.push_str("</script></body></html>");
    html
}

fn push_option(html: &mut String, value: &str, text: &str, selected: bool) {
    html.push_str("<option value='");
    html.push_str(value);
    html.push('\'');
    if selected {
        html.push_str(" selected");
    }
    html.push('>');
    html.push_str(text);
    html.push_str("</option>");
}

fn push_checkbox(html: &mut String, id: &str, text: &str, checked: bool) {
    html.push_str("<label class='check'><input type='checkbox' id='");
    html.push_str(id);
    html.push('\'');
    if checked {
        html.push_str(" checked");
    }
    html.push('>');
    html.push_str(text);
    html.push_str("</label>");
}
