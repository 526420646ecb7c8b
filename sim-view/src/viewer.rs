//! Interactive stem growth viewer built with eframe/egui.
//!
//! This module defines [`Viewer`], which owns a running [`Simulation`]
//! (observed through a [`DropTrail`]) plus a pending [`Config`] that the
//! side panel edits, and implements [`eframe::App`] to render and drive it.

use eframe::App;
use glam::Vec2;
use rand::Rng;
use stems_core::{
    Config, DropTrail, Landing, PlaneShape, SimError, Simulation, geometry, snapshot,
};

/// Main application state for the interactive viewer.
///
/// The typical per-frame update is:
/// 1. Handle UI interactions / input.
/// 2. If `running` is `true` and enough time has passed, call [`Viewer::step_once`].
/// 3. Render the plane, stems and the last drop's trail.
///
/// ### Fields
/// - `sim` - The live simulation; its observer records the last drop.
/// - `cfg` - Pending configuration, applied on the next reset.
/// - `cfg_error` - Why the pending configuration was last rejected, if it was.
/// - `seed` - Seed of the current run.
///
/// - `running` - Whether the simulation is currently auto-advancing.
/// - `steps_per_frame` - Drops resolved per auto step.
/// - `halted` - Set when a step failed; the run cannot continue.
/// - `zoom` - Pixels per world unit.
/// - `pan` - Screen-space pan offset in pixels.
///
/// - `tall_only` - Draw only stems at least half as tall as the tallest.
/// - `show_bounce_radius` - Draw bounce-distance rings around stems.
///
/// - `step_interval` - Target time between automatic steps (seconds).
/// - `last_step_time` - Time stamp of the last step (egui time).
/// - `last_step_dt` - Actual time delta between the last two steps (for display only).
pub struct Viewer {
    sim: Simulation<DropTrail>,
    cfg: Config,
    cfg_error: Option<String>,
    seed: u64,

    running: bool,
    steps_per_frame: u32,
    halted: Option<String>,
    zoom: f32,
    pan: egui::Vec2,

    tall_only: bool,
    show_bounce_radius: bool,

    step_interval: f64,
    last_step_time: f64,
    last_step_dt: f64,
}

impl Viewer {
    /// Creates a viewer running [`Config::default`] with a random seed.
    ///
    /// ### Errors
    /// Returns [`SimError`] if the default configuration is rejected.
    pub fn new() -> Result<Self, SimError> {
        let cfg = Config::default();
        let seed = rand::rng().random();
        let sim = Simulation::new(cfg, seed)?.with_observer(DropTrail::default());

        Ok(Self {
            sim,
            cfg,
            cfg_error: None,
            seed,
            running: false,
            steps_per_frame: 50,
            halted: None,
            zoom: 300.0,
            pan: egui::vec2(0.0, 0.0),
            tall_only: false,
            show_bounce_radius: false,
            step_interval: 0.02,
            last_step_time: 0.0,
            last_step_dt: 0.0,
        })
    }

    /// Restarts the simulation from an empty plane with the pending config.
    ///
    /// If the pending config is invalid the current run is left untouched
    /// and the reason is shown in the config panel.
    fn reset(&mut self, seed: u64) {
        match Simulation::new(self.cfg, seed) {
            Ok(sim) => {
                self.sim = sim.with_observer(DropTrail::default());
                self.seed = seed;
                self.cfg_error = None;
                self.halted = None;
                self.running = false;
                tracing::info!(seed, "Simulation reset");
            }
            Err(err) => {
                tracing::warn!(%err, "Pending config rejected");
                self.cfg_error = Some(err.to_string());
            }
        }
    }

    /// Advances the simulation by `steps_per_frame` drops.
    ///
    /// A failed step halts the run; the error is kept for the status bar.
    fn step_once(&mut self) {
        if self.halted.is_some() {
            return;
        }
        for _ in 0..self.steps_per_frame {
            if let Err(err) = self.sim.step() {
                tracing::error!(%err, step = self.sim.steps_completed(), "Simulation halted");
                self.halted = Some(err.to_string());
                self.running = false;
                break;
            }
        }
    }

    /// Converts a world-space position to screen-space.
    ///
    /// World coordinates are scaled by `zoom`, offset by `pan`, and then
    /// centered inside the given `rect`. The y-axis is flipped so that
    /// positive y goes up in world space.
    fn world_to_screen(&self, p: Vec2, rect: egui::Rect) -> egui::Pos2 {
        let center = rect.center();
        egui::pos2(
            center.x + p.x * self.zoom + self.pan.x,
            center.y - p.y * self.zoom + self.pan.y,
        )
    }

    /// Converts a screen-space position back to world-space.
    ///
    /// This is the inverse of [`Viewer::world_to_screen`] (up to floating
    /// point rounding).
    fn screen_to_world(&self, p: egui::Pos2, rect: egui::Rect) -> Vec2 {
        let center = rect.center();
        let x = (p.x - center.x - self.pan.x) / self.zoom;
        let y = (center.y - p.y + self.pan.y) / self.zoom;
        Vec2::new(x, y)
    }

    /// Red ramp from dark (short) to bright (tallest).
    fn stem_color(height: u32, max_height: u32) -> egui::Color32 {
        let t = height as f32 / (max_height as f32 + 1.0);
        let r = (60.0 + 195.0 * t).round() as u8;
        egui::Color32::from_rgb(r, 30, 30)
    }

    /// Helper to draw a labeled `f32` [`egui::DragValue`].
    fn labeled_drag_f32(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut f32,
        range: std::ops::RangeInclusive<f32>,
        speed: f64,
    ) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed));
        });
    }

    /// Helper to draw a labeled `f64` [`egui::DragValue`].
    fn labeled_drag_f64(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut f64,
        range: std::ops::RangeInclusive<f64>,
        speed: f64,
    ) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed));
        });
    }

    /// Helper to draw a labeled `u32` [`egui::DragValue`].
    fn labeled_drag_u32(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut u32,
        range: std::ops::RangeInclusive<u32>,
        speed: f64,
    ) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed));
        });
    }

    /// Builds the top panel UI (run controls, stepping, zoom).
    fn ui_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let can_run = self.halted.is_none();
                if ui
                    .add_enabled(
                        can_run,
                        egui::Button::new(if self.running { "⏸ Pause" } else { "▶ Run" }),
                    )
                    .clicked()
                {
                    self.running = !self.running;
                }

                ui.add(
                    egui::DragValue::new(&mut self.step_interval)
                        .prefix("dt target = ")
                        .range(0.0..=1.0)
                        .speed(0.01),
                );
                ui.add(
                    egui::DragValue::new(&mut self.steps_per_frame)
                        .prefix("drops/step = ")
                        .range(1..=100_000)
                        .speed(10.0),
                );

                if ui.add_enabled(can_run, egui::Button::new("Step")).clicked() {
                    let now = ctx.input(|i| i.time);
                    if self.last_step_time > 0.0 {
                        self.last_step_dt = now - self.last_step_time;
                    }
                    self.step_once();
                    self.last_step_time = now;
                }

                if ui.button("Reset").clicked() {
                    self.reset(self.seed);
                }

                if ui.button("New seed").clicked() {
                    let seed = rand::rng().random();
                    self.reset(seed);
                }

                ui.separator();
                ui.add(egui::Slider::new(&mut self.zoom, 50.0..=5000.0).text("Zoom"));
            });
        });
    }

    /// Builds the bottom status bar (steps, stems, tallest stem, last drop).
    fn ui_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("dt target = {:.3} s", self.step_interval));
                ui.label(format!("dt last = {:.3} s", self.last_step_dt));
                ui.separator();
                ui.label(format!("seed = {}", self.seed));
                ui.label(format!("steps = {}", self.sim.steps_completed()));
                ui.label(format!("stems = {}", self.sim.len()));
                ui.label(format!(
                    "max height = {}",
                    self.sim.max_height().unwrap_or(0)
                ));
                if let Some(landing) = self.sim.observer().landing {
                    ui.label(Self::describe_landing(&landing));
                }
                if let Some(err) = &self.halted {
                    ui.colored_label(egui::Color32::RED, format!("halted: {err}"));
                }
            });
        });
    }

    fn describe_landing(landing: &Landing) -> String {
        match *landing {
            Landing::Discarded { bounces } => format!("last drop: discarded after {bounces} bounces"),
            Landing::Grounded { id, bounces } => {
                format!("last drop: new stem {id} after {bounces} bounces")
            }
            Landing::Stacked {
                id,
                replaced,
                bounces,
            } => format!("last drop: stem {replaced} → {id} after {bounces} bounces"),
        }
    }

    /// Builds the right-hand panel editing the pending configuration.
    fn ui_config_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("config_panel")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.heading("Config");
                ui.label("Edits apply on Reset.");

                ui.separator();
                ui.label("Plane");
                ui.horizontal(|ui| {
                    if ui
                        .selectable_label(self.cfg.plane_shape == PlaneShape::Disk, "○ Disk")
                        .clicked()
                    {
                        self.cfg.plane_shape = PlaneShape::Disk;
                    }
                    if ui
                        .selectable_label(self.cfg.plane_shape == PlaneShape::Square, "■ Square")
                        .clicked()
                    {
                        self.cfg.plane_shape = PlaneShape::Square;
                    }
                });
                ui.checkbox(&mut self.cfg.periodic_boundary, "periodic boundary");

                ui.separator();
                ui.label("Radii");
                Self::labeled_drag_f32(ui, "drop_radius:", &mut self.cfg.drop_radius, 0.001..=0.5, 0.001);
                Self::labeled_drag_f32(ui, "stem_radius:", &mut self.cfg.stem_radius, 0.001..=0.5, 0.001);
                Self::labeled_drag_f32(
                    ui,
                    "bounce_distance:",
                    &mut self.cfg.bounce_distance,
                    0.0..=1.5,
                    0.005,
                );

                ui.separator();
                ui.label("Sticking");
                Self::labeled_drag_f64(
                    ui,
                    "ground_stick_p:",
                    &mut self.cfg.ground_stick_probability,
                    0.0..=1.0,
                    0.005,
                );
                Self::labeled_drag_f64(
                    ui,
                    "stem_stick_p:",
                    &mut self.cfg.stem_stick_probability,
                    0.0..=1.0,
                    0.005,
                );
                Self::labeled_drag_u32(
                    ui,
                    "height_addition:",
                    &mut self.cfg.bounce_height_addition,
                    0..=200,
                    1.0,
                );
                Self::labeled_drag_f32(
                    ui,
                    "old_genome_bias:",
                    &mut self.cfg.old_genome_bias,
                    0.0..=500.0,
                    0.5,
                );

                ui.separator();
                ui.label("Melt");
                Self::labeled_drag_f64(
                    ui,
                    "melt_p:",
                    &mut self.cfg.melt_probability,
                    0.0..=1.0,
                    0.001,
                );
                Self::labeled_drag_u32(ui, "melt_interval:", &mut self.cfg.melt_interval, 1..=1000, 1.0);

                ui.separator();
                let mut limited = self.cfg.bounce_limit.is_some();
                if ui.checkbox(&mut limited, "limit bounces").changed() {
                    self.cfg.bounce_limit = limited.then_some(8);
                }
                if let Some(limit) = self.cfg.bounce_limit.as_mut() {
                    Self::labeled_drag_u32(ui, "bounce_limit:", limit, 0..=64, 1.0);
                }

                ui.separator();
                ui.label("Display");
                ui.checkbox(&mut self.tall_only, "tall stems only");
                ui.checkbox(&mut self.show_bounce_radius, "show bounce radius");

                ui.separator();
                if let Err(err) = self.cfg.validate() {
                    ui.colored_label(egui::Color32::YELLOW, err.to_string());
                }
                if let Some(err) = &self.cfg_error {
                    ui.colored_label(egui::Color32::RED, err);
                }
                if ui.button("Reset cfg to default").clicked() {
                    self.cfg = Config::default();
                }
            });
    }

    /// Draws the plane outline for the running simulation's shape.
    fn draw_plane(&self, painter: &egui::Painter, rect: egui::Rect) {
        let stroke = egui::Stroke::new(1.5, egui::Color32::GRAY);
        let extent = geometry::HALF_EXTENT;
        match self.sim.config().plane_shape {
            PlaneShape::Disk => {
                let center = self.world_to_screen(Vec2::ZERO, rect);
                painter.circle_stroke(center, extent * self.zoom, stroke);
            }
            PlaneShape::Square => {
                let corners = [
                    Vec2::new(-extent, -extent),
                    Vec2::new(extent, -extent),
                    Vec2::new(extent, extent),
                    Vec2::new(-extent, extent),
                ];
                let points: Vec<egui::Pos2> = corners
                    .iter()
                    .map(|&c| self.world_to_screen(c, rect))
                    .collect();
                painter.add(egui::Shape::closed_line(points, stroke));
            }
        }
    }

    /// Draws stems colored by height, plus optional bounce rings.
    fn draw_stems(&self, painter: &egui::Painter, rect: egui::Rect) {
        let cfg = self.sim.config();
        let max_height = self.sim.max_height().unwrap_or(0);
        let radius = (cfg.stem_radius * self.zoom).max(1.5);

        for stem in self.sim.field().iter() {
            if self.tall_only && !snapshot::is_tall(stem.height, max_height) {
                continue;
            }
            let p = self.world_to_screen(stem.pos, rect);
            let color = Self::stem_color(stem.height, max_height);
            painter.circle_filled(p, radius, color);

            if self.show_bounce_radius {
                let stroke = egui::Stroke::new(0.5, color);
                let outer = (cfg.bounce_distance + cfg.drop_radius) * self.zoom;
                let inner = (cfg.bounce_distance - cfg.drop_radius).max(0.0) * self.zoom;
                painter.circle_stroke(p, outer, stroke);
                painter.circle_stroke(p, inner, stroke);
            }
        }
    }

    /// Draws the last drop: blue where it fell, green bounces, linked by lines.
    fn draw_trail(&self, painter: &egui::Painter, rect: egui::Rect) {
        let trail = &self.sim.observer().path;
        let radius = (self.sim.config().drop_radius * self.zoom).max(1.5);

        let points: Vec<egui::Pos2> = trail.iter().map(|&p| self.world_to_screen(p, rect)).collect();
        for pair in points.windows(2) {
            painter.line_segment(
                [pair[0], pair[1]],
                egui::Stroke::new(1.0, egui::Color32::LIGHT_GREEN),
            );
        }
        for (i, &p) in points.iter().enumerate() {
            let color = if i == 0 {
                egui::Color32::from_rgba_unmultiplied(0, 0, 255, 100)
            } else {
                egui::Color32::from_rgba_unmultiplied(0, 255, 0, 100)
            };
            painter.circle_filled(p, radius, color);
        }
    }

    /// Builds the central panel where the plane, stems and trail are drawn.
    fn ui_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let response = ui.allocate_response(ui.available_size(), egui::Sense::click_and_drag());
            let rect = response.rect;
            let painter = ui.painter_at(rect);

            // Pan with drag.
            if response.dragged() {
                let delta = response.drag_delta();
                self.pan += delta;
            }

            // Zoom around the mouse cursor.
            if ui.ctx().input(|i| i.raw_scroll_delta.y != 0.0) {
                let scroll = ui.ctx().input(|i| i.raw_scroll_delta.y);
                if scroll != 0.0 {
                    let pointer_screen = response.hover_pos().unwrap_or(rect.center());

                    let world_before = self.screen_to_world(pointer_screen, rect);

                    let factor = (1.0 + scroll * 0.001).clamp(0.5, 2.0);
                    self.zoom = (self.zoom * factor).clamp(50.0, 5000.0);

                    let screen_after = self.world_to_screen(world_before, rect);

                    let delta = pointer_screen - screen_after;
                    self.pan += delta;
                }
            }

            self.draw_plane(&painter, rect);
            self.draw_stems(&painter, rect);
            self.draw_trail(&painter, rect);

            // Hover readout for the stem under the cursor.
            if let Some(world) = response.hover_pos().map(|p| self.screen_to_world(p, rect)) {
                let cfg = self.sim.config();
                let under = self
                    .sim
                    .field()
                    .iter()
                    .find(|s| geometry::circles_intersect(world, 0.0, s.pos, cfg.stem_radius));
                if let Some(stem) = under {
                    painter.text(
                        self.world_to_screen(stem.pos, rect) + egui::vec2(8.0, -8.0),
                        egui::Align2::LEFT_BOTTOM,
                        format!("#{} h={}", stem.id, stem.height),
                        egui::FontId::monospace(12.0),
                        egui::Color32::WHITE,
                    );
                }
            }

            // Auto-run simulation if requested.
            if self.running {
                let now = ctx.input(|i| i.time);
                let elapsed = now - self.last_step_time;
                if elapsed >= self.step_interval {
                    if self.last_step_time > 0.0 {
                        self.last_step_dt = elapsed;
                    }
                    self.step_once();
                    self.last_step_time = now;
                }

                ctx.request_repaint();
            }
        });
    }
}

impl App for Viewer {
    /// eframe callback that builds all UI panels for each frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui_top_panel(ctx);
        self.ui_status_bar(ctx);
        self.ui_config_panel(ctx);
        self.ui_central_panel(ctx);
    }
}
