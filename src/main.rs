use anyhow::{anyhow, Result};
use eframe::egui;
use egui::{Color32, CornerRadius, RichText, ScrollArea, Stroke, Ui, ViewportBuilder};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod hn_client;
mod models;
mod query_cache;
mod view;
mod worker;

use crate::config::AppConfig;
use crate::hn_client::{HackerNewsSearchClient, SearchTransport};
use crate::models::{Hit, SortKey};
use crate::query_cache::QueryCacheManager;
use crate::worker::Fetcher;

fn init_tracing(level: &str) {
    // RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() -> Result<()> {
    let (config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_tracing(&config.log_level);
    if let Some(e) = config_error {
        warn!(error = %e, "falling back to default configuration");
    }
    info!(base_url = %config.base_url, hits_per_page = config.hits_per_page, "starting");

    let transport: Arc<dyn SearchTransport> = Arc::new(HackerNewsSearchClient::new(&config)?);

    let options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("HN Search Viewer"),
        ..Default::default()
    };

    eframe::run_native(
        "HN Search Viewer",
        options,
        Box::new(move |cc| {
            let mut app = HnSearchApp::new(&cc.egui_ctx, &config, transport);

            if let Some(storage) = cc.storage {
                if let Some(theme_str) = storage.get_string("is_dark_mode") {
                    if let Ok(is_dark_mode) = theme_str.parse::<bool>() {
                        app.set_dark_mode(is_dark_mode);
                    }
                }
            }

            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow!("ui terminated: {}", e))
}

struct AppTheme {
    background: Color32,
    card_background: Color32,
    text: Color32,
    secondary_text: Color32,
    highlight: Color32,
    separator: Color32,
    button_background: Color32,
    button_foreground: Color32,
    button_active_background: Color32,
    button_hover_background: Color32,
}

impl AppTheme {
    fn dark() -> Self {
        Self {
            background: Color32::from_rgb(18, 18, 18),
            card_background: Color32::from_rgb(30, 30, 30),
            text: Color32::from_rgb(240, 240, 240),
            secondary_text: Color32::from_rgb(180, 180, 180),
            highlight: Color32::from_rgb(255, 102, 0), // HN orange
            separator: Color32::from_rgb(60, 60, 60),
            button_background: Color32::from_rgb(66, 66, 66),
            button_foreground: Color32::from_rgb(240, 240, 240),
            button_active_background: Color32::from_rgb(255, 102, 0),
            button_hover_background: Color32::from_rgb(80, 80, 80),
        }
    }

    fn light() -> Self {
        Self {
            background: Color32::from_rgb(245, 245, 245),
            card_background: Color32::from_rgb(255, 255, 255),
            text: Color32::from_rgb(20, 20, 20),
            secondary_text: Color32::from_rgb(90, 90, 90),
            highlight: Color32::from_rgb(235, 92, 0),
            separator: Color32::from_rgb(200, 200, 200),
            button_background: Color32::from_rgb(235, 235, 235),
            button_foreground: Color32::from_rgb(20, 20, 20),
            button_active_background: Color32::from_rgb(235, 92, 0),
            button_hover_background: Color32::from_rgb(210, 210, 210),
        }
    }

    fn apply_to_ctx(&self, ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();

        style.visuals.panel_fill = self.background;
        style.visuals.window_fill = self.card_background;
        style.visuals.window_stroke = Stroke::new(1.0, self.separator);
        style.visuals.widgets.noninteractive.bg_fill = self.card_background;
        style.visuals.widgets.noninteractive.fg_stroke = Stroke::new(1.0, self.text);

        style.visuals.widgets.inactive.bg_fill = self.button_background;
        style.visuals.widgets.inactive.fg_stroke = Stroke::new(1.0, self.button_foreground);
        style.visuals.widgets.active.bg_fill = self.button_active_background;
        style.visuals.widgets.active.fg_stroke = Stroke::new(1.0, self.button_foreground);
        style.visuals.widgets.hovered.bg_fill = self.button_hover_background;
        style.visuals.widgets.hovered.fg_stroke = Stroke::new(1.0, self.button_foreground);

        style.visuals.selection.bg_fill = self.highlight;
        style.visuals.selection.stroke = Stroke::new(1.0, self.highlight);

        style.visuals.widgets.inactive.corner_radius = CornerRadius::same(4);
        style.visuals.widgets.hovered.corner_radius = CornerRadius::same(4);
        style.visuals.widgets.active.corner_radius = CornerRadius::same(4);

        ctx.set_style(style);
    }
}

/// User intents gathered while rendering, applied once the frame's borrows end.
enum Intent {
    Submit,
    More,
    Dismiss(String),
    Sort(SortKey),
    OpenLink(String),
}

struct HnSearchApp {
    manager: QueryCacheManager,
    fetcher: Fetcher,
    // Bound to the text field; mirrored into the manager on every edit
    search_input: String,
    focus_search: bool,
    theme: AppTheme,
    is_dark_mode: bool,
}

impl HnSearchApp {
    fn new(ctx: &egui::Context, config: &AppConfig, transport: Arc<dyn SearchTransport>) -> Self {
        let repaint_ctx = ctx.clone();
        let fetcher = Fetcher::new(transport).with_waker(move || repaint_ctx.request_repaint());

        let mut manager = QueryCacheManager::new(config.default_query.clone(), config.page_ordering);
        if let Some(request) = manager.start() {
            fetcher.spawn(request);
        }

        Self {
            search_input: config.default_query.clone(),
            manager,
            fetcher,
            focus_search: true,
            theme: AppTheme::dark(),
            is_dark_mode: true,
        }
    }

    fn set_dark_mode(&mut self, is_dark_mode: bool) {
        self.is_dark_mode = is_dark_mode;
        self.theme = if is_dark_mode {
            AppTheme::dark()
        } else {
            AppTheme::light()
        };
    }

    fn apply_intent(&mut self, intent: Intent) {
        match intent {
            Intent::Submit => {
                if let Some(request) = self.manager.submit_search(self.search_input.clone()) {
                    self.fetcher.spawn(request);
                }
            }
            Intent::More => {
                let request = self.manager.request_more();
                self.fetcher.spawn(request);
            }
            Intent::Dismiss(object_id) => self.manager.dismiss(&object_id),
            Intent::Sort(sort_key) => self.manager.set_sort(sort_key),
            Intent::OpenLink(url) => self.open_link(&url),
        }
    }

    fn open_link(&self, url: &str) {
        if let Err(e) = open::that(url) {
            warn!(url, error = %e, "failed to open URL");
        }
    }

    fn render_search_bar(&mut self, ui: &mut Ui, intents: &mut Vec<Intent>) {
        ui.horizontal(|ui| {
            ui.heading(RichText::new("HN Search").color(self.theme.highlight).size(22.0));
            ui.add_space(16.0);

            let input = ui.add(
                egui::TextEdit::singleline(&mut self.search_input)
                    .desired_width(320.0)
                    .hint_text("Search Hacker News"),
            );
            if self.focus_search {
                input.request_focus();
                self.focus_search = false;
            }
            if input.changed() {
                self.manager.set_search_input(self.search_input.clone());
            }
            let entered = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

            let search_btn = ui.add(
                egui::Button::new(RichText::new("Search").color(self.theme.button_foreground))
                    .fill(self.theme.button_background)
                    .corner_radius(CornerRadius::same(4)),
            );
            if entered || search_btn.clicked() {
                intents.push(Intent::Submit);
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let theme_icon = if self.is_dark_mode { "☀" } else { "☾" };
                let theme_btn = ui.add(
                    egui::Button::new(RichText::new(theme_icon).color(self.theme.button_foreground).size(18.0))
                        .min_size(egui::Vec2::new(28.0, 28.0))
                        .corner_radius(CornerRadius::same(14))
                        .fill(self.theme.button_background),
                );
                if theme_btn.hovered() {
                    ui.output_mut(|o| o.cursor_icon = egui::CursorIcon::PointingHand);
                }
                if theme_btn.clicked() {
                    self.set_dark_mode(!self.is_dark_mode);
                    ui.ctx().request_repaint();
                }
            });
        });
    }

    fn sort_button(&self, ui: &mut Ui, sort_key: SortKey, intents: &mut Vec<Intent>) {
        let is_active = self.manager.sort_key() == sort_key;
        let fill = if is_active {
            self.theme.button_active_background
        } else {
            self.theme.button_background
        };
        let btn = ui.add(
            egui::Button::new(RichText::new(sort_key.label()).color(self.theme.button_foreground).strong())
                .fill(fill)
                .corner_radius(CornerRadius::same(4)),
        );
        if btn.clicked() {
            intents.push(Intent::Sort(sort_key));
        }
    }

    fn render_table(&self, ui: &mut Ui, rows: &[Hit], intents: &mut Vec<Intent>) {
        egui::Grid::new("results_table")
            .num_columns(5)
            .striped(true)
            .spacing([16.0, 6.0])
            .show(ui, |ui| {
                for sort_key in SortKey::COLUMNS {
                    self.sort_button(ui, sort_key, intents);
                }
                ui.label(RichText::new("Archive").color(self.theme.secondary_text).strong());
                ui.end_row();

                for hit in rows {
                    let title = ui.add(
                        egui::Label::new(
                            RichText::new(hit.title.as_deref().unwrap_or_default())
                                .color(self.theme.text)
                                .strong(),
                        )
                        .sense(egui::Sense::click()),
                    );
                    if title.hovered() && hit.url.is_some() {
                        ui.output_mut(|o| o.cursor_icon = egui::CursorIcon::PointingHand);
                    }
                    if title.clicked() {
                        if let Some(url) = hit.url.as_ref().filter(|u| !u.is_empty()) {
                            intents.push(Intent::OpenLink(url.clone()));
                        }
                    }

                    ui.label(
                        RichText::new(hit.author.as_deref().unwrap_or_default())
                            .color(self.theme.secondary_text),
                    );
                    ui.label(optional_number(hit.num_comments));
                    ui.label(optional_number(hit.points));

                    if ui.small_button("Dismiss").clicked() {
                        intents.push(Intent::Dismiss(hit.object_id.clone()));
                    }
                    ui.end_row();
                }
            });
    }
}

fn optional_number(value: Option<i64>) -> String {
    value.map(|n| n.to_string()).unwrap_or_default()
}

impl eframe::App for HnSearchApp {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        storage.set_string("is_dark_mode", self.is_dark_mode.to_string());
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.manager.teardown();
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.theme.apply_to_ctx(ctx);

        for outcome in self.fetcher.poll() {
            self.manager.apply(outcome);
        }

        let mut intents = Vec::new();

        egui::TopBottomPanel::top("search_bar").show(ctx, |ui| {
            ui.add_space(8.0);
            self.render_search_bar(ui, &mut intents);
            ui.add_space(8.0);
        });

        egui::TopBottomPanel::bottom("pagination").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.vertical_centered(|ui| {
                if self.manager.is_loading() {
                    ui.add(egui::Spinner::new().size(28.0).color(self.theme.highlight));
                } else if ui
                    .add(
                        egui::Button::new(RichText::new("More").color(self.theme.button_foreground))
                            .fill(self.theme.button_background)
                            .corner_radius(CornerRadius::same(4)),
                    )
                    .clicked()
                {
                    intents.push(Intent::More);
                }
            });
            ui.add_space(6.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.manager.last_error().is_some() {
                ui.vertical_centered(|ui| {
                    ui.add_space(20.0);
                    ui.label(
                        RichText::new("Something went wrong.")
                            .color(self.theme.secondary_text)
                            .size(18.0),
                    );
                });
                return;
            }

            let rows = self.manager.visible_hits();
            ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| self.render_table(ui, &rows, &mut intents));
        });

        for intent in intents {
            self.apply_intent(intent);
        }
    }
}
