//! UI panels for the application
//!
//! Sidebar with the records actions and statistics, the sidebar toggle button and the
//! hints drawn over the map.

use crate::app::settings::TilesProvider;
use crate::app::state::{AppState, UiAction};
use egui::{Color32, RichText, Ui};
use std::path::PathBuf;

/// Render the sidebar toggle button (overlaid on top-right of map)
pub fn sidebar_toggle_button(ui: &mut Ui, state: &mut AppState) {
    let button_size = egui::vec2(40.0, 40.0);
    let margin = 10.0;

    let rect = ui.max_rect();
    let button_pos = rect.right_top() + egui::vec2(-button_size.x - margin, margin);
    let button_rect = egui::Rect::from_min_size(button_pos, button_size);

    let response = ui.allocate_rect(button_rect, egui::Sense::click());
    if response.clicked() {
        state.ui_settings.sidebar_open = !state.ui_settings.sidebar_open;
    }

    let bg_color = if response.hovered() {
        ui.visuals().widgets.hovered.bg_fill
    } else {
        ui.visuals().widgets.inactive.bg_fill
    };
    ui.painter().rect_filled(button_rect, 5.0, bg_color);

    let icon = if state.ui_settings.sidebar_open {
        "✕"
    } else {
        "☰"
    };
    ui.painter().text(
        button_rect.center(),
        egui::Align2::CENTER_CENTER,
        icon,
        egui::FontId::proportional(20.0),
        ui.visuals().text_color(),
    );
}

/// Render the sidebar, returning the action the user asked for
pub fn render_sidebar(ctx: &egui::Context, state: &mut AppState, loading: bool) -> Option<UiAction> {
    if !state.ui_settings.sidebar_open {
        return None;
    }

    egui::SidePanel::right("main_sidebar")
        .default_width(280.0)
        .min_width(240.0)
        .max_width(420.0)
        .resizable(true)
        .show(ctx, |ui| render_sidebar_content(ui, state, loading))
        .inner
}

fn render_sidebar_content(ui: &mut Ui, state: &mut AppState, loading: bool) -> Option<UiAction> {
    let mut action = None;

    ui.heading("🥾 Trails");
    ui.separator();

    ui.horizontal(|ui| {
        if ui.button("📂 Open...").clicked() {
            action = Some(UiAction::Open);
        }
        let can_refresh = state.records.path.is_some();
        if ui
            .add_enabled(can_refresh, egui::Button::new("🔄 Refresh"))
            .clicked()
        {
            action = Some(UiAction::Refresh);
        }
        if ui
            .add_enabled(state.has_records(), egui::Button::new("🗑 Clear"))
            .clicked()
        {
            action = Some(UiAction::Clear);
        }
    });

    if let Some(path) = &state.records.path {
        ui.label(
            RichText::new(file_label(path))
                .small()
                .color(ui.visuals().weak_text_color()),
        );
    }

    ui.add_space(8.0);

    if loading {
        ui.label(
            RichText::new("⏳ Loading records...")
                .strong()
                .color(ui.visuals().warn_fg_color),
        );
        ui.add_space(8.0);
    }

    if let Some(error) = &state.records.error {
        ui.label(RichText::new(format!("⚠ {}", error)).color(Color32::RED));
        ui.add_space(8.0);
    }

    ui.separator();
    render_stats_section(ui, state);

    ui.add_space(8.0);
    ui.separator();

    ui.label(RichText::new("Map tiles").strong());
    egui::ComboBox::from_id_salt("tiles_provider")
        .selected_text(state.ui_settings.tiles_provider.name())
        .show_ui(ui, |ui| {
            for provider in TilesProvider::all() {
                ui.selectable_value(
                    &mut state.ui_settings.tiles_provider,
                    *provider,
                    provider.name(),
                );
            }
        });

    action
}

fn render_stats_section(ui: &mut Ui, state: &AppState) {
    ui.label(RichText::new("📊 Statistics").strong());

    if !state.has_records() {
        ui.label(RichText::new("No records loaded").italics());
        return;
    }

    let stats = state.stats();
    egui::Grid::new("stats_grid")
        .num_columns(2)
        .spacing([12.0, 4.0])
        .show(ui, |ui| {
            ui.label("Records:");
            ui.label(stats.records.to_string());
            ui.end_row();

            ui.label("With geometry:");
            ui.label(stats.features.to_string());
            ui.end_row();

            ui.label("Lines:");
            ui.label(stats.lines.to_string());
            ui.end_row();

            ui.label("Points:");
            ui.label(stats.points.to_string());
            ui.end_row();

            if stats.polygons > 0 {
                ui.label("Polygons:");
                ui.label(stats.polygons.to_string());
                ui.end_row();
            }

            for (reason, count) in &stats.dropped {
                ui.label(format!("Dropped ({}):", reason));
                ui.label(count.to_string());
                ui.end_row();
            }
        });
}

fn file_label(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Ask the user for a records file
pub fn pick_records_file() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("Trail records", &["json", "geojson"])
        .set_title("Select trail records")
        .pick_file()
}

/// Centered hint over the map (loading indicator or empty state)
pub fn map_hint(ui: &Ui, text: &str) {
    let rect = ui.max_rect();
    let painter = ui.painter();
    let galley = painter.layout_no_wrap(
        text.to_string(),
        egui::FontId::proportional(16.0),
        ui.visuals().text_color(),
    );
    let hint_rect = egui::Rect::from_center_size(rect.center(), galley.size())
        .expand2(egui::vec2(14.0, 10.0));
    painter.rect_filled(hint_rect, 6.0, ui.visuals().window_fill);
    painter.galley(
        hint_rect.center() - galley.size() / 2.0,
        galley,
        ui.visuals().text_color(),
    );
}
