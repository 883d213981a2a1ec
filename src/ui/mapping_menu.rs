use egui::{ComboBox, Grid, RichText, Ui};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tracing::debug;

use super::common::{create_frame, status_color, UiColors};
use crate::input::LiveFrame;
use crate::mapping::{ButtonMapping, MappingHandle, AXIS_SLOTS, BUTTON_SLOTS};

/// How long the save result stays on screen
const SAVE_STATUS_DURATION: Duration = Duration::from_secs(3);

/// Axis values above this magnitude are highlighted
const AXIS_HIGHLIGHT: f32 = 0.1;

/// Button mapping editor plus a live view of the polled gamepad.
pub struct MappingMenuData {
    draft: ButtonMapping,
    mapping: MappingHandle,
    live: watch::Receiver<LiveFrame>,
    runtime: Handle,
    pending_save: Option<oneshot::Receiver<bool>>,
    save_status: Option<(bool, Instant)>,
}

impl MappingMenuData {
    pub fn new(mapping: MappingHandle, live: watch::Receiver<LiveFrame>, runtime: Handle) -> Self {
        let draft = mapping.current().map(|m| *m).unwrap_or_default();
        Self {
            draft,
            mapping,
            live,
            runtime,
            pending_save: None,
            save_status: None,
        }
    }

    pub fn render(&mut self, ui: &mut Ui) {
        self.poll_save();

        ui.heading("Gamepad mapping");
        ui.add_space(4.0);

        ui.horizontal_top(|ui| {
            create_frame(UiColors::INNER_BG, UiColors::BORDER).show(ui, |ui| {
                ui.vertical(|ui| self.render_editor(ui));
            });
            create_frame(UiColors::INNER_BG, UiColors::BORDER).show(ui, |ui| {
                ui.vertical(|ui| self.render_live(ui));
            });
        });
    }

    fn render_editor(&mut self, ui: &mut Ui) {
        Grid::new("mapping_grid")
            .num_columns(2)
            .spacing([12.0, 6.0])
            .show(ui, |ui| {
                slot_combo(ui, "Throttle button", &mut self.draft.throttle_index, BUTTON_SLOTS);
                slot_combo(ui, "Reverse button", &mut self.draft.reverse_index, BUTTON_SLOTS);
                slot_combo(ui, "Steering axis", &mut self.draft.steering_index, AXIS_SLOTS);
                slot_combo(
                    ui,
                    "Offset right button",
                    &mut self.draft.steer_offset_right_index,
                    BUTTON_SLOTS,
                );
                slot_combo(
                    ui,
                    "Offset left button",
                    &mut self.draft.steer_offset_left_index,
                    BUTTON_SLOTS,
                );
            });

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            let saving = self.pending_save.is_some();
            if ui.add_enabled(!saving, egui::Button::new("Save")).clicked() {
                self.start_save();
            }
            if ui.button("Revert").clicked() {
                self.draft = self.mapping.current().map(|m| *m).unwrap_or_default();
            }
            if let Some(text) = self.save_status_text() {
                let ok = matches!(self.save_status, Some((true, _)));
                ui.label(RichText::new(text).color(status_color(ok)));
                ui.ctx().request_repaint_after(Duration::from_millis(250));
            }
        });
    }

    fn render_live(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Live gamepad").strong());
        let live = self.live.borrow().clone();
        let Some(frame) = live else {
            ui.label("No gamepad detected");
            return;
        };

        Grid::new("live_buttons").striped(true).show(ui, |ui| {
            for (index, button) in frame.buttons.iter().enumerate() {
                let text = RichText::new(format!("B{:<2} {:.2}", index, button.value)).monospace();
                if button.pressed {
                    ui.label(text.color(UiColors::ACTIVE).strong());
                } else {
                    ui.label(text);
                }
                if index % 4 == 3 {
                    ui.end_row();
                }
            }
        });
        ui.add_space(4.0);
        Grid::new("live_axes").show(ui, |ui| {
            for (index, value) in frame.axes.iter().enumerate() {
                let text = RichText::new(format!("A{} {:+.2}", index, value)).monospace();
                if value.abs() > AXIS_HIGHLIGHT {
                    ui.label(text.color(UiColors::ACTIVE).strong());
                } else {
                    ui.label(text);
                }
            }
            ui.end_row();
        });
    }

    fn start_save(&mut self) {
        let (tx, rx) = oneshot::channel();
        let mapping = self.mapping.clone();
        let draft = self.draft;
        debug!("Saving mapping from editor: {:?}", draft);
        self.runtime.spawn(async move {
            let _ = tx.send(mapping.save_and_swap(draft).await);
        });
        self.pending_save = Some(rx);
        self.save_status = None;
    }

    fn poll_save(&mut self) {
        let Some(rx) = self.pending_save.as_mut() else {
            return;
        };
        match rx.try_recv() {
            Ok(ok) => {
                self.save_status = Some((ok, Instant::now()));
                self.pending_save = None;
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
            Err(oneshot::error::TryRecvError::Closed) => {
                self.save_status = Some((false, Instant::now()));
                self.pending_save = None;
            }
        }
    }

    fn save_status_text(&self) -> Option<&'static str> {
        let (ok, at) = self.save_status?;
        if at.elapsed() >= SAVE_STATUS_DURATION {
            return None;
        }
        Some(if ok { "Saved" } else { "Save failed" })
    }
}

fn slot_combo(ui: &mut Ui, label: &str, value: &mut usize, slots: usize) {
    ui.label(label);
    ComboBox::from_id_salt(label)
        .selected_text(value.to_string())
        .show_ui(ui, |ui| {
            for index in 0..slots {
                ui.selectable_value(&mut *value, index, index.to_string());
            }
        });
    ui.end_row();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::store::tests::scratch_dir;
    use crate::mapping::store::MAPPING_FILE;
    use crate::mapping::MappingStore;

    fn menu(tag: &str) -> (MappingMenuData, MappingHandle) {
        let handle = MappingHandle::new(MappingStore::new(scratch_dir(tag).join(MAPPING_FILE)));
        let (_live_tx, live) = watch::channel(None);
        (
            MappingMenuData::new(handle.clone(), live, Handle::current()),
            handle,
        )
    }

    async fn wait_for_save(menu: &mut MappingMenuData) {
        for _ in 0..200 {
            menu.poll_save();
            if menu.pending_save.is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("save did not finish");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_reports_success_and_swaps_the_snapshot() {
        let (mut menu, handle) = menu("menu-save");
        menu.draft.throttle_index = 3;
        menu.start_save();
        wait_for_save(&mut menu).await;

        assert_eq!(menu.save_status_text(), Some("Saved"));
        assert_eq!(handle.current().map(|m| m.throttle_index), Some(3));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn out_of_range_draft_reports_failure() {
        let (mut menu, handle) = menu("menu-fail");
        menu.draft.steering_index = AXIS_SLOTS;
        menu.start_save();
        wait_for_save(&mut menu).await;

        assert_eq!(menu.save_status_text(), Some("Save failed"));
        assert!(handle.current().is_none());
    }

    #[tokio::test]
    async fn status_disappears_after_three_seconds() {
        let (mut menu, _handle) = menu("menu-expire");
        menu.save_status = Some((true, Instant::now() - Duration::from_secs(4)));
        assert_eq!(menu.save_status_text(), None);
    }
}
