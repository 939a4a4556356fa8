//! Terminal stand-in for the document root that display preferences target.

use std::collections::BTreeSet;

use railsafe_core::settings::DisplaySurface;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct TerminalSurface {
    font_scale: u16,
    classes: BTreeSet<String>,
    animation_duration: Option<String>,
}

impl TerminalSurface {
    /// One-line summary for the status output.
    pub fn describe(&self) -> String {
        let classes: Vec<&str> = self.classes.iter().map(String::as_str).collect();
        format!(
            "font {}%, classes [{}], animations {}",
            self.font_scale,
            classes.join(" "),
            self.animation_duration.as_deref().unwrap_or("default")
        )
    }
}

impl DisplaySurface for TerminalSurface {
    fn set_font_scale(&mut self, percent: u16) {
        if self.font_scale != percent {
            tracing::debug!(percent, "Font scale applied");
            self.font_scale = percent;
        }
    }

    fn set_class(&mut self, class: &str, enabled: bool) {
        let changed = if enabled {
            self.classes.insert(class.to_string())
        } else {
            self.classes.remove(class)
        };
        if changed {
            tracing::debug!(class, enabled, "Display class toggled");
        }
    }

    fn set_animation_duration(&mut self, duration: Option<&str>) {
        self.animation_duration = duration.map(str::to_string);
    }
}
