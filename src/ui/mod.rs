//! # Operator console
//!
//! egui window in front of the relay. It shows whether any client is
//! connected, renders the live control state, forwards every key press and
//! release to the dispatcher and hosts the gamepad mapping editor.
//!
//! The console never touches control state itself. Key events become
//! [`Command::KeyDown`] / [`Command::KeyUp`] on the dispatcher queue; everything
//! displayed comes back through `watch` channels.
//!
//! Layout:
//! - **Top Panel**: navigation between console and mapping editor
//! - **Central Panel**: the selected screen
//! - **Bottom Panel**: connection status and listen address

pub mod common;
pub mod console;
pub mod mapping_menu;

use egui::{Button, Event, Key, RichText, Vec2};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::control::ControlState;
use crate::input::{KeyCode, LiveFrame};
use crate::mapping::MappingHandle;
use crate::relay::{Command, DispatcherHandle};

use self::common::{status_color, MenuState};
use self::console::ConsoleView;
use self::mapping_menu::MappingMenuData;

/// Everything the console reads from or writes to the backend.
pub struct ConsoleChannels {
    pub dispatcher: DispatcherHandle,
    pub state: watch::Receiver<ControlState>,
    pub status: watch::Receiver<bool>,
    pub live: watch::Receiver<LiveFrame>,
    pub mapping: MappingHandle,
    pub listen_addr: SocketAddr,
    pub runtime: Handle,
}

pub struct RelayConsole {
    menu_state: MenuState,
    console: ConsoleView,
    mapping_menu: MappingMenuData,
    keys: mpsc::UnboundedSender<Command>,
    listen_addr: SocketAddr,
}

impl RelayConsole {
    pub fn new(cc: &eframe::CreationContext<'_>, channels: ConsoleChannels) -> Self {
        cc.egui_ctx.set_theme(egui::Theme::Dark);
        let (keys, _forwarder) = spawn_key_forwarder(&channels.runtime, channels.dispatcher);
        Self {
            menu_state: MenuState::Console,
            console: ConsoleView::new(channels.state, channels.status),
            mapping_menu: MappingMenuData::new(channels.mapping, channels.live, channels.runtime),
            keys,
            listen_addr: channels.listen_addr,
        }
    }

    /// Forwards key presses and releases, auto-repeats included.
    fn forward_keys(&self, ctx: &egui::Context) {
        let commands: Vec<Command> = ctx.input(|input| {
            input
                .events
                .iter()
                .filter_map(|event| match event {
                    Event::Key { key, pressed, .. } => Some(key_command(*key, *pressed)),
                    _ => None,
                })
                .collect()
        });

        for command in commands {
            debug!("Forwarding {:?}", command);
            if self.keys.send(command).is_err() {
                error!("Key forwarder stopped, key event lost");
            }
        }
    }
}

/// Moves key events from the UI thread to the dispatcher in order.
///
/// The UI never blocks on a full command queue, and no key event is dropped
/// because of one: the forwarder waits for room instead. A lost release would
/// leave the throttle held.
pub fn spawn_key_forwarder(
    runtime: &Handle,
    dispatcher: DispatcherHandle,
) -> (mpsc::UnboundedSender<Command>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
    let task = runtime.spawn(async move {
        while let Some(command) = rx.recv().await {
            if let Err(e) = dispatcher.send(command).await {
                error!("Key event not delivered to dispatcher: {}", e);
                break;
            }
        }
        debug!("Key forwarder stopped");
    });
    (tx, task)
}

/// egui key to the browser-style code the keyboard mapping understands.
pub fn key_code(key: Key) -> KeyCode {
    match key {
        Key::ArrowUp => KeyCode::ArrowUp,
        Key::ArrowDown => KeyCode::ArrowDown,
        Key::ArrowLeft => KeyCode::ArrowLeft,
        Key::ArrowRight => KeyCode::ArrowRight,
        other => KeyCode::Other(other.name().to_string()),
    }
}

pub fn key_command(key: Key, pressed: bool) -> Command {
    let code = key_code(key);
    if pressed {
        Command::KeyDown(code)
    } else {
        Command::KeyUp(code)
    }
}

impl eframe::App for RelayConsole {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.forward_keys(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.ctx().request_repaint_after(Duration::from_millis(33));
            let width = ui.available_width() - 30.0;

            egui::TopBottomPanel::top("top_panel")
                .show_separator_line(false)
                .show_inside(ui, |ui| {
                    ui.horizontal_centered(|ui| {
                        let size = Vec2 {
                            x: width / 2.0,
                            y: 20.0,
                        };
                        if ui.add(Button::new("Console").min_size(size)).clicked() {
                            self.menu_state = MenuState::Console;
                        }
                        if ui.add(Button::new("Mapping").min_size(size)).clicked() {
                            self.menu_state = MenuState::Mapping;
                        }
                    });
                });

            egui::TopBottomPanel::bottom("bottom_panel")
                .show_separator_line(false)
                .show_inside(ui, |ui| {
                    ui.horizontal_centered(|ui| {
                        ui.label(
                            RichText::new("●").color(status_color(self.console.is_connected())),
                        );
                        ui.label(self.console.status_text());
                        ui.label(format!("ws://{}", self.listen_addr));
                    });
                });

            egui::CentralPanel::default().show_inside(ui, |ui| match self.menu_state {
                MenuState::Console => self.console.render(ui),
                MenuState::Mapping => self.mapping_menu.render(ui),
            });
        });
    }
}
