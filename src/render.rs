//! Terminal rendering of the area grid
//!
//! Draws one block per area, `columns` blocks per row: green for normal, red
//! for alarm. The renderer only ever reads store snapshots.

use crate::areas::{Area, AreaState};
use crate::serial::LinkState;
use chrono::Local;
use colored::Colorize;

/// Clear screen and home the cursor
const CLEAR: &str = "\x1b[2J\x1b[H";

/// Grid rows as display strings
pub fn render_grid(areas: &[Area], columns: usize) -> Vec<String> {
    areas
        .chunks(columns.max(1))
        .map(|row| {
            row.iter()
                .map(render_block)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn render_block(area: &Area) -> String {
    let label = format!(" Area {:>2} ", area.id);
    match area.state {
        AreaState::Normal => label.black().on_green().to_string(),
        AreaState::Alarm => label.white().bold().on_red().to_string(),
    }
}

/// Header line with link status and alarm count
pub fn render_status(areas: &[Area], link: LinkState) -> String {
    let alarms: Vec<&Area> = areas.iter().filter(|a| a.state == AreaState::Alarm).collect();

    let link = match link {
        LinkState::Running | LinkState::Connected => link.to_string().green().bold(),
        LinkState::Finished | LinkState::Stopped => link.to_string().yellow().bold(),
        LinkState::Disconnected | LinkState::Failed => link.to_string().red().bold(),
    };

    let summary = if alarms.is_empty() {
        "all areas normal".green().to_string()
    } else {
        let ids: Vec<String> = alarms.iter().map(|a| a.id.to_string()).collect();
        format!("FIRE in area {}", ids.join(", ")).red().bold().to_string()
    };

    format!("[{}] {}", link, summary)
}

/// Lines listing when each alarm was raised
pub fn render_alarm_times(areas: &[Area]) -> Vec<String> {
    areas
        .iter()
        .filter(|a| a.state == AreaState::Alarm)
        .filter_map(|a| {
            a.changed_at
                .map(|t| format!("  Area {:>2} since {}", a.id, t.format("%H:%M:%S")))
        })
        .collect()
}

/// Redraws the whole panel
pub struct TerminalRenderer {
    columns: usize,
    clear_screen: bool,
}

impl TerminalRenderer {
    pub fn new(columns: usize) -> Self {
        Self {
            columns,
            clear_screen: true,
        }
    }

    /// Print frames one after another instead of redrawing in place
    pub fn without_clear(mut self) -> Self {
        self.clear_screen = false;
        self
    }

    pub fn frame(&self, areas: &[Area], link: LinkState) -> String {
        let mut out = String::new();
        if self.clear_screen {
            out.push_str(CLEAR);
        }

        out.push_str(&format!("{}\n", "Fire Detection System".cyan().bold()));
        out.push_str(&format!("{}\n", "=".repeat(self.columns * 10).dimmed()));
        out.push_str(&render_status(areas, link));
        out.push_str("\n\n");

        for row in render_grid(areas, self.columns) {
            out.push_str(&row);
            out.push_str("\n\n");
        }

        let times = render_alarm_times(areas);
        if !times.is_empty() {
            for line in times {
                out.push_str(&line);
                out.push('\n');
            }
            out.push('\n');
        }

        out.push_str(&format!(
            "{}\n",
            format!("Updated {} | Ctrl+C to quit", Local::now().format("%H:%M:%S")).dimmed()
        ));
        out
    }

    pub fn draw(&self, areas: &[Area], link: LinkState) {
        print!("{}", self.frame(areas, link));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::AreaStateStore;
    use crate::protocol::AreaEvent;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_grid_layout() {
        plain();
        let store = AreaStateStore::new(32);
        let rows = render_grid(&store.snapshot(), 8);
        assert_eq!(rows.len(), 4);
        assert!(rows[0].starts_with(" Area  1 "));
        assert!(rows[3].ends_with(" Area 32 "));
    }

    #[test]
    fn test_partial_last_row() {
        plain();
        let store = AreaStateStore::new(10);
        let rows = render_grid(&store.snapshot(), 8);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], " Area  9   Area 10 ");
    }

    #[test]
    fn test_status_lists_alarms() {
        plain();
        let store = AreaStateStore::new(32);
        assert_eq!(
            render_status(&store.snapshot(), LinkState::Running),
            "[LIVE] all areas normal"
        );

        store.apply_event(AreaEvent::AreaAlarm(3));
        store.apply_event(AreaEvent::AreaAlarm(17));
        assert_eq!(
            render_status(&store.snapshot(), LinkState::Disconnected),
            "[DISCONNECTED] FIRE in area 3, 17"
        );
        assert_eq!(render_alarm_times(&store.snapshot()).len(), 2);
    }

    #[test]
    fn test_frame_without_clear() {
        plain();
        let store = AreaStateStore::new(4);
        let frame = TerminalRenderer::new(4)
            .without_clear()
            .frame(&store.snapshot(), LinkState::Finished);
        assert!(frame.starts_with("Fire Detection System"));
        assert!(frame.contains("[FINISHED]"));
    }
}
