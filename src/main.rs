use clap::Parser;
use iced::widget::{button, column, container, horizontal_rule, row, text};
use iced::{Element, Length, Task, Theme};
use rfd::FileDialog;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod args;
mod avatar;
mod config;
mod error;
mod pipeline;
mod state;
mod ui;

use avatar::AvatarTable;
use config::AppConfig;
use error::TryOnError;
use pipeline::{run_in_background, ProcessingInvoker, RunReport, UploadPipeline};
use state::data::{ImageRef, Slot, ACCEPTED_EXTENSIONS};
use state::history::{HistoryEntry, TryOnHistory};
use state::session::SharedSession;
use state::storage::StorageManager;

/// How many outputs the gallery shows
const GALLERY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Home,
    Avatars,
    Uploads,
    Outputs,
}

impl Tab {
    const ALL: [Tab; 4] = [Tab::Home, Tab::Avatars, Tab::Uploads, Tab::Outputs];

    fn title(&self) -> &'static str {
        match self {
            Tab::Home => "Home",
            Tab::Avatars => "Avatars",
            Tab::Uploads => "User Images",
            Tab::Outputs => "Output Images",
        }
    }
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    SelectTab(Tab),
    /// User clicked one of the "Load ... Image" buttons
    PickImage(Slot),
    /// User clicked "Run try-on"
    RunTryOn,
    /// Background compositor run finished
    RunFinished(Result<RunReport, String>),
}

/// Everything built from the settings before the window opens
struct Startup {
    config: AppConfig,
    storage: Arc<StorageManager>,
    history: Option<TryOnHistory>,
}

/// Main application state
struct ShopperApp {
    session: SharedSession,
    storage: Arc<StorageManager>,
    uploads: UploadPipeline,
    invoker: ProcessingInvoker,
    /// Everything mirrored into `input_images/`, for the User Images tab
    uploaded: Vec<PathBuf>,
    /// None when the catalog could not be opened; outputs are then kept in memory only
    history: Option<TryOnHistory>,
    outputs: Vec<HistoryEntry>,
    avatars: Option<Result<AvatarTable, String>>,
    /// Pixel size of the images currently in each slot
    dimensions: HashMap<Slot, (u32, u32)>,
    tab: Tab,
    /// Status message to display to the user
    status: String,
}

impl ShopperApp {
    fn new(startup: Startup) -> (Self, Task<Message>) {
        let Startup {
            config,
            storage,
            history,
        } = startup;

        let session = SharedSession::new();
        let uploads = UploadPipeline::new(storage.clone(), session.clone());
        let invoker = ProcessingInvoker::new(session.clone(), storage.clone(), config.compositor());

        let outputs = history
            .as_ref()
            .and_then(|h| h.recent(GALLERY_LIMIT).map_err(|e| log::warn!("⚠️  Could not read history: {}", e)).ok())
            .unwrap_or_default();

        let avatars = config
            .avatars_csv
            .as_ref()
            .map(|path| AvatarTable::load(path).map_err(|e| e.to_string()));

        log::info!("🎨 AI Personal Shopper initialized with {} previous outputs", outputs.len());

        let mut app = ShopperApp {
            session,
            storage,
            uploads,
            invoker,
            uploaded: Vec::new(),
            history,
            outputs,
            avatars,
            dimensions: HashMap::new(),
            tab: Tab::Home,
            status: "Load a photo of yourself and a garment to get started.".to_string(),
        };
        app.refresh_uploaded();

        (app, Task::none())
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::SelectTab(tab) => {
                self.tab = tab;
                Task::none()
            }
            Message::PickImage(slot) => {
                // Show the native file picker dialog
                let picked = FileDialog::new()
                    .set_title(format!("Select the {} image", slot.label().to_lowercase()))
                    .add_filter("Images", &ACCEPTED_EXTENSIONS)
                    .pick_file();

                if let Some(source) = picked {
                    match self.uploads.upload(slot, &source) {
                        Ok(image) => {
                            self.remember_dimensions(slot, &image);
                            self.refresh_uploaded();
                            self.status = format!("{} image loaded: {}", slot.label(), image.file_name());
                        }
                        Err(e) => {
                            log::error!("❌ Upload failed: {}", e);
                            self.status = format!("❌ {}", e);
                        }
                    }
                }

                Task::none()
            }
            Message::RunTryOn => {
                self.status = "Running the try-on, this can take a while...".to_string();

                // Preconditions and Busy are checked again by the invoker itself
                Task::perform(run_in_background(self.invoker.clone()), |result| {
                    Message::RunFinished(result.map_err(|e| e.to_string()))
                })
            }
            Message::RunFinished(Ok(report)) => {
                self.record_output(&report);
                self.status = format!("✅ Try-on complete: {}", report.output.file_name());
                self.tab = Tab::Outputs;
                Task::none()
            }
            Message::RunFinished(Err(e)) => {
                self.status = format!("❌ {}", e);
                Task::none()
            }
        }
    }

    fn refresh_uploaded(&mut self) {
        match self.storage.uploaded_images() {
            Ok(images) => self.uploaded = images,
            Err(e) => log::warn!("⚠️  Could not list uploaded images: {}", e),
        }
    }

    fn remember_dimensions(&mut self, slot: Slot, image: &ImageRef) {
        match image::image_dimensions(image.path()) {
            Ok(dims) => {
                self.dimensions.insert(slot, dims);
            }
            Err(e) => {
                log::debug!("Could not read dimensions of {}: {}", image, e);
                self.dimensions.remove(&slot);
            }
        }
    }

    fn record_output(&mut self, report: &RunReport) {
        if let Some(history) = &self.history {
            let refreshed = history
                .record(&report.person, &report.garment, &report.output)
                .and_then(|_| history.recent(GALLERY_LIMIT));
            match refreshed {
                Ok(outputs) => {
                    self.outputs = outputs;
                    return;
                }
                Err(e) => log::warn!("⚠️  Could not record try-on in history: {}", e),
            }
        }

        // In-memory fallback: newest first, one tile per output path
        let output_path = report.output.path().to_string_lossy().to_string();
        self.outputs.retain(|entry| entry.output_path != output_path);
        self.outputs.insert(
            0,
            HistoryEntry {
                id: 0,
                person_path: report.person.path().to_string_lossy().to_string(),
                garment_path: report.garment.path().to_string_lossy().to_string(),
                output_path,
                created_at: chrono::Utc::now().timestamp(),
            },
        );
    }

    /// Build the user interface
    fn view(&self) -> Element<'_, Message> {
        let tabs = row(Tab::ALL.iter().map(|&tab| {
            let label = text(tab.title()).size(16);
            let tab_button = button(label).padding(8);
            if tab == self.tab {
                tab_button.into()
            } else {
                tab_button.on_press(Message::SelectTab(tab)).into()
            }
        }))
        .spacing(4);

        let body = match self.tab {
            Tab::Home => {
                let (person, garment, output, state, last_error) = {
                    let session = self.session.lock();
                    (
                        self.preview(Slot::Person, session.person_image()),
                        self.preview(Slot::Garment, session.garment_image()),
                        session.output_image().cloned(),
                        session.state(),
                        session.last_error().map(str::to_string),
                    )
                };
                ui::home::view(person, garment, output, state, last_error, &self.status)
            }
            Tab::Avatars => ui::avatars::view(self.avatars.as_ref()),
            Tab::Uploads => ui::uploads::view(&self.uploaded),
            Tab::Outputs => column![text(&self.status).size(14), ui::gallery::view(&self.outputs)]
                .spacing(12)
                .into(),
        };

        container(column![tabs, horizontal_rule(1), body].spacing(12).padding(20))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn preview(&self, slot: Slot, image: Option<&ImageRef>) -> ui::home::SlotPreview {
        ui::home::SlotPreview {
            slot,
            image: image.cloned(),
            dimensions: self.dimensions.get(&slot).copied(),
        }
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Prepare the working directory, storage folders and history catalog
fn prepare(mut config: AppConfig) -> Result<Startup, TryOnError> {
    fs::create_dir_all(&config.workdir)
        .map_err(|e| TryOnError::io(format!("Failed to create {}", config.workdir.display()), e))?;
    config.workdir = fs::canonicalize(&config.workdir)
        .map_err(|e| TryOnError::io(format!("Failed to resolve {}", config.workdir.display()), e))?;

    let storage = Arc::new(StorageManager::new(&config.workdir, config.mirror_legacy_input));
    storage.ensure_directories()?;

    let history = match open_history(&config, &storage) {
        Ok(history) => Some(history),
        Err(e) => {
            log::warn!("⚠️  Try-on history disabled: {}", e);
            None
        }
    };

    Ok(Startup {
        config,
        storage,
        history,
    })
}

fn open_history(config: &AppConfig, storage: &StorageManager) -> Result<TryOnHistory, TryOnError> {
    let history = match config.history_db.clone().or_else(TryOnHistory::default_path) {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| TryOnError::io(format!("Failed to create {}", parent.display()), e))?;
            }
            TryOnHistory::open(path)?
        }
        None => TryOnHistory::open_in_memory()?,
    };

    history.prune_missing()?;
    history.import_existing(&storage.output_dir())?;
    Ok(history)
}

fn print_avatars(path: &Path) -> Result<(), TryOnError> {
    let table = AvatarTable::load(path)?;
    println!("{}", table.to_json()?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = args::Args::parse();

    if let Some(csv) = &args.avatars {
        print_avatars(csv)?;
        return Ok(());
    }

    let mut config = AppConfig::load(&args.config)?;
    if let Some(workdir) = args.workdir {
        config.workdir = workdir;
    }

    if args.write_config {
        config.save(&args.config)?;
        println!("Wrote settings to {}", args.config.display());
        return Ok(());
    }

    let startup = prepare(config)?;

    iced::application("AI Personal Shopper", ShopperApp::update, ShopperApp::view)
        .theme(ShopperApp::theme)
        .window_size((1000.0, 650.0))
        .centered()
        .run_with(move || ShopperApp::new(startup))?;

    Ok(())
}
