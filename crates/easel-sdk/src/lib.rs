//! # Easel SDK
//!
//! The [`Studio`] is the single owner of editor state. Hosts (desktop shells,
//! web views, CLIs) send it [`Action`]s, feed it pointer input each frame and
//! subscribe to its [`StudioEvent`]s; generation jobs and autosave run on
//! tokio tasks and only talk back through channels.

pub mod state;

pub use state::{Action, AppState, GenerationSettings, PlaybackChange};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use easel_canvas::history::{HistoryManager, HistoryState};
use easel_canvas::input::InputState;
use easel_canvas::model::{ElementFlags, ElementId, PlacedElement, SceneGraph, VideoPlayback};
use easel_canvas::placement::{beside, centered_in_view, fit_within};
use easel_canvas::view::Viewport;
use easel_canvas::{Canvas, CanvasError, LogicEvent};
use easel_core::error::GenerationError;
use easel_core::events::{StudioEvent, StudioEventBus};
use easel_core::generation::{GenerationEvent, GenerationRunner, GenerationTracker, Transition};
use easel_core::inference::{FalClient, GenerationRequest, InferenceClient};
use easel_core::ingest::{FfprobeProbe, IncomingFile, VideoProbe, ingest};
use easel_core::store::{AutosaveSnapshot, Autosaver, CanvasStore, SqliteCanvasStore, load_scene};
use easel_core::StudioConfig;
use glam::Vec2;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Natural size requested for text-to-image results before fitting.
const TEXT_TO_IMAGE_SIZE: Vec2 = Vec2::new(512.0, 512.0);
/// Margin kept around the content by [`Action::FitToContent`], in pixels.
const FIT_PADDING: f32 = 50.0;
/// How often [`Studio::run_until_idle`] checks for timed-out jobs.
const EXPIRY_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Coordinator tying the canvas, history, generation jobs and storage together.
///
/// Must be created inside a tokio runtime.
pub struct Studio {
    state: AppState,
    history: HistoryManager,
    runner: GenerationRunner,
    autosaver: Autosaver,
    events: StudioEventBus,
    store: Arc<dyn CanvasStore>,
    probe: Arc<dyn VideoProbe>,
    config: StudioConfig,
}

enum Wake {
    Event(GenerationEvent),
    Tick,
    Closed,
}

impl Studio {
    pub fn new(
        config: StudioConfig,
        store: Arc<dyn CanvasStore>,
        client: Arc<dyn InferenceClient>,
    ) -> Self {
        let events = StudioEventBus::default();
        let autosaver = Autosaver::new(store.clone(), config.autosave_debounce, Some(events.clone()));

        Self {
            state: AppState {
                scene: SceneGraph::new(),
                canvas: Canvas::new(config.canvas.clone()),
                settings: GenerationSettings::default(),
                generations: GenerationTracker::new(config.generation_timeout),
            },
            history: HistoryManager::new(config.canvas.history_limit),
            runner: GenerationRunner::new(client),
            autosaver,
            events,
            store,
            probe: Arc::new(FfprobeProbe::default()),
            config,
        }
    }

    /// Opens the SQLite store and fal client named by `config` and restores the saved canvas.
    pub async fn open(config: StudioConfig) -> Result<Self> {
        let store = SqliteCanvasStore::new(&config.database_url)
            .await
            .with_context(|| format!("Failed to open canvas store at {}", config.database_url))?;
        let client = FalClient::new(&config).context("Failed to build inference client")?;

        let mut studio = Self::new(config, Arc::new(store), Arc::new(client));
        studio.load().await;
        Ok(studio)
    }

    pub fn with_probe(mut self, probe: Arc<dyn VideoProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Replaces the current canvas with the persisted one (or an empty canvas)
    /// and starts a fresh history at that state.
    pub async fn load(&mut self) {
        let (scene, viewport) = load_scene(self.store.as_ref()).await;
        self.state.scene = scene;
        self.state.canvas.set_viewport(viewport);
        self.history.clear();
        self.history.record(HistoryState::capture(&self.state.scene));
    }

    // --- Accessors ---

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.state.scene
    }

    pub fn viewport(&self) -> Viewport {
        self.state.canvas.viewport()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn generations(&self) -> &GenerationTracker {
        &self.state.generations
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.events.subscribe()
    }

    // --- Reducer ---

    /// Applies one action.
    ///
    /// Edits to the scene are recorded in history; anything that changes
    /// persisted state schedules an autosave.
    pub fn dispatch(&mut self, action: Action) -> Result<()> {
        tracing::trace!(?action, "Dispatch");
        let scene = &mut self.state.scene;

        match action {
            Action::AddElement(element) => {
                scene.insert(element)?;
                self.commit();
            }
            Action::UpdateElement(element) => {
                let id = element.id.clone();
                scene.try_update(&id, |_| element.with_crop(element.crop))?;
                self.commit();
            }
            Action::MoveSelection(delta) => {
                let movable: Vec<ElementId> = scene
                    .iter()
                    .filter(|e| e.is_selected() && !e.flags.contains(ElementFlags::LOCKED))
                    .map(|e| e.id.clone())
                    .collect();
                if movable.is_empty() {
                    return Ok(());
                }
                for id in &movable {
                    scene.update(id, |e| e.with_position(e.position + delta))?;
                }
                self.commit();
            }
            Action::SetCrop { id, crop } => {
                scene.try_update(&id, |e| e.with_crop(crop))?;
                self.commit();
            }
            Action::SetLocked { id, locked } => {
                scene.update(&id, |e| {
                    let mut flags = e.flags;
                    flags.set(ElementFlags::LOCKED, locked);
                    e.with_flags(flags)
                })?;
                self.commit();
            }
            Action::DeleteSelection => {
                let removed = scene.remove_selected();
                if removed.is_empty() {
                    return Ok(());
                }
                for element in &removed {
                    self.stop_tracking(&element.id);
                }
                if let Some(id) = self.state.canvas.interaction_mode.cropping_id().cloned()
                    && !self.state.scene.contains(&id)
                {
                    self.state.canvas.end_crop();
                }
                self.commit();
            }
            Action::DuplicateSelection => {
                let offset = Vec2::splat(self.config.canvas.duplicate_offset);
                let created = scene.duplicate_selected(offset, Utc::now().timestamp_millis());
                if !created.is_empty() {
                    self.commit();
                }
            }
            Action::BeginCrop(id) => {
                self.state.canvas.begin_crop(scene, &id)?;
            }
            Action::EndCrop => {
                if self.state.canvas.end_crop().is_some() {
                    self.commit();
                }
            }

            Action::Select(id) => {
                if !scene.contains(&id) {
                    return Err(CanvasError::UnknownElement(id).into());
                }
                scene.select_only(&id);
            }
            Action::ToggleSelect(id) => scene.toggle_selection(&id),
            Action::SelectAll => scene.select_all(),
            Action::ClearSelection => scene.clear_selection(),

            Action::BringToFront(id) => {
                if scene.bring_to_front(&id) {
                    self.commit();
                }
            }
            Action::SendToBack(id) => {
                if scene.send_to_back(&id) {
                    self.commit();
                }
            }
            Action::BringForward(id) => {
                if scene.bring_forward(&id) {
                    self.commit();
                }
            }
            Action::SendBackward(id) => {
                if scene.send_backward(&id) {
                    self.commit();
                }
            }

            Action::SetViewport(viewport) => {
                self.state.canvas.set_viewport(viewport);
                self.schedule_save();
            }
            Action::SetCanvasSize(size) => self.state.canvas.update_canvas_size(size),
            Action::ZoomIn => {
                if self.state.canvas.view.zoom_in(self.config.canvas.zoom_step) {
                    self.schedule_save();
                }
            }
            Action::ZoomOut => {
                if self.state.canvas.view.zoom_out(self.config.canvas.zoom_step) {
                    self.schedule_save();
                }
            }
            Action::ResetZoom => {
                self.state.canvas.view.reset();
                self.schedule_save();
            }
            Action::FitToContent => {
                if let Some(bounds) = scene.bounds() {
                    self.state.canvas.view.fit_to(bounds, FIT_PADDING);
                    self.schedule_save();
                }
            }

            Action::SetPlayback { id, change } => {
                let playback = *scene
                    .get(&id)
                    .ok_or_else(|| CanvasError::UnknownElement(id.clone()))?
                    .playback()
                    .ok_or_else(|| GenerationError::WrongMediaKind(id.clone(), "video"))?;
                scene.update(&id, |e| e.with_playback(change.apply(playback)))?;
                self.schedule_save();
            }

            Action::Undo => {
                if let Some(snapshot) = self.history.undo() {
                    self.state.scene = snapshot.restore();
                    self.after_restore();
                }
            }
            Action::Redo => {
                if let Some(snapshot) = self.history.redo() {
                    self.state.scene = snapshot.restore();
                    self.after_restore();
                }
            }

            Action::SetSettings(settings) => self.state.settings = settings,
            Action::ApplyStyle {
                style_id,
                prompt,
                lora_url,
            } => {
                self.state.settings = GenerationSettings {
                    prompt,
                    lora_url,
                    style_id: Some(style_id),
                    ..self.state.settings.clone()
                };
            }
            Action::Generate => self.generate()?,
            Action::RemoveBackground(id) => {
                let source = self.source(&id, false)?;
                self.launch(id, GenerationRequest::RemoveBackground { image_url: source.src }, None)?;
            }
            Action::IsolateObject { id, prompt } => {
                let prompt = non_empty(prompt)?;
                let source = self.source(&id, false)?;
                let request = GenerationRequest::IsolateObject {
                    image_url: source.src,
                    prompt,
                };
                self.launch(id, request, None)?;
            }
            Action::ImageToVideo {
                id,
                prompt,
                duration,
            } => {
                let source = self.source(&id, false)?;
                let placeholder = self.video_placeholder_beside(&source);
                let request = GenerationRequest::ImageToVideo {
                    image_url: source.src,
                    prompt,
                    duration,
                };
                self.launch(placeholder.id.clone(), request, Some(placeholder))?;
            }
            Action::VideoToVideo { id, prompt } => {
                let prompt = non_empty(prompt)?;
                let source = self.source(&id, true)?;
                let placeholder = self.video_placeholder_beside(&source);
                let request = GenerationRequest::VideoToVideo {
                    video_url: source.src,
                    prompt,
                };
                self.launch(placeholder.id.clone(), request, Some(placeholder))?;
            }
            Action::ExtendVideo { id, prompt } => {
                let source = self.source(&id, true)?;
                let placeholder = self.video_placeholder_beside(&source);
                let request = GenerationRequest::ExtendVideo {
                    video_url: source.src,
                    prompt,
                };
                self.launch(placeholder.id.clone(), request, Some(placeholder))?;
            }
            Action::RemoveVideoBackground(id) => {
                let source = self.source(&id, true)?;
                self.launch(id, GenerationRequest::RemoveVideoBackground { video_url: source.src }, None)?;
            }
            Action::CancelGeneration(id) => {
                let transition = self
                    .state
                    .generations
                    .cancel(&id)
                    .ok_or(GenerationError::NotActive(id.clone()))?;
                self.runner.abort(&id);
                self.apply_transition(transition);
            }
        }
        Ok(())
    }

    // --- Frame loop ---

    /// Runs the interaction state machine for one frame of input and carries
    /// out the resulting requests (delete, duplicate, undo, ...).
    ///
    /// The events are returned so the host can decide whether to repaint.
    pub fn frame(&mut self, input: &InputState) -> Vec<LogicEvent> {
        let events = self.state.canvas.update(input, &mut self.state.scene);

        for event in &events {
            let action = match event {
                LogicEvent::DeleteSelection => Action::DeleteSelection,
                LogicEvent::DuplicateSelection => Action::DuplicateSelection,
                LogicEvent::Undo => Action::Undo,
                LogicEvent::Redo => Action::Redo,
                LogicEvent::ElementsMoved { .. } | LogicEvent::CropFinished { .. } => {
                    self.commit();
                    continue;
                }
                LogicEvent::ViewportChanged => {
                    self.schedule_save();
                    continue;
                }
                _ => continue,
            };
            if let Err(e) = self.dispatch(action) {
                tracing::warn!(error = %e, ?event, "Canvas request failed");
            }
        }
        events
    }

    /// Applies every generation update received so far and fails jobs that
    /// ran past the timeout. Returns the number of canvas transitions.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        for event in self.runner.drain() {
            if let Some(transition) = self.state.generations.apply(event) {
                self.apply_transition(transition);
                applied += 1;
            }
        }
        applied + self.expire_generations()
    }

    /// Waits until no generation is active, applying updates as they arrive.
    pub async fn run_until_idle(&mut self) {
        while !self.state.generations.is_empty() {
            let wake = tokio::select! {
                event = self.runner.recv() => event.map_or(Wake::Closed, Wake::Event),
                _ = tokio::time::sleep(EXPIRY_CHECK_INTERVAL) => Wake::Tick,
            };
            match wake {
                Wake::Event(event) => {
                    if let Some(transition) = self.state.generations.apply(event) {
                        self.apply_transition(transition);
                    }
                }
                Wake::Tick => {
                    self.expire_generations();
                }
                Wake::Closed => break,
            }
        }
    }

    // --- Files ---

    /// Places a dropped or picked file on the canvas, selected alone.
    ///
    /// Returns `Ok(None)` for unsupported file types.
    pub async fn ingest_file(&mut self, file: IncomingFile) -> Result<Option<ElementId>> {
        let placed = ingest(
            &file,
            &self.state.canvas.view,
            &self.config.canvas,
            self.probe.as_ref(),
        )
        .await;

        let element = match placed {
            Ok(Some(element)) => element,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.events
                    .emit(StudioEvent::error("Failed to add file", format!("{}: {e}", file.name)));
                return Err(e.into());
            }
        };

        let id = element.id.clone();
        self.state.scene.clear_selection();
        self.state.scene.insert(element)?;
        self.commit();
        Ok(Some(id))
    }

    // --- Persistence ---

    /// Writes any pending autosave now.
    pub async fn flush(&self) {
        self.autosaver.flush().await;
    }

    /// Stops local tracking of every job and writes pending state.
    pub async fn shutdown(self) {
        drop(self.runner);
        self.autosaver.shutdown().await;
    }

    // --- Internals ---

    /// Records the current scene in history and schedules a save.
    fn commit(&mut self) {
        self.history.record(HistoryState::capture(&self.state.scene));
        self.schedule_save();
    }

    fn schedule_save(&self) {
        let mut scene = self.state.scene.clone();
        // Placeholders only exist while their job runs.
        for key in self.state.generations.keys() {
            if self.state.generations.get(key).is_some_and(|g| g.placeholder) {
                scene.remove(key);
            }
        }
        let snapshot = AutosaveSnapshot::capture(&scene, self.viewport(), Utc::now().timestamp_millis());
        self.autosaver.schedule(snapshot);
    }

    fn after_restore(&mut self) {
        self.reconcile_generating();
        if let Some(id) = self.state.canvas.interaction_mode.cropping_id().cloned()
            && !self.state.scene.contains(&id)
        {
            self.state.canvas.end_crop();
        }
        self.schedule_save();
    }

    /// Makes the `GENERATING` flag match the tracker after a snapshot was restored.
    ///
    /// Placeholders from finished jobs that never received media are dropped.
    fn reconcile_generating(&mut self) {
        let stale: Vec<(ElementId, bool, bool)> = self
            .state
            .scene
            .iter()
            .filter_map(|e| {
                let active = self.state.generations.is_active(&e.id);
                let flagged = e.flags.contains(ElementFlags::GENERATING);
                (active != flagged).then(|| (e.id.clone(), active, e.src.is_empty()))
            })
            .collect();

        for (id, active, empty) in stale {
            if !active && empty {
                self.state.scene.remove(&id);
            } else {
                self.set_generating(&id, active);
            }
        }
    }

    fn set_generating(&mut self, id: &ElementId, on: bool) {
        let _ = self.state.scene.update(id, |e| {
            let mut flags = e.flags;
            flags.set(ElementFlags::GENERATING, on);
            e.with_flags(flags)
        });
    }

    fn stop_tracking(&mut self, id: &ElementId) {
        if self.state.generations.cancel(id).is_some() {
            self.runner.abort(id);
            tracing::info!(element_id = %id, "Generation dropped with its element");
        }
    }

    fn source(&self, id: &ElementId, video: bool) -> Result<PlacedElement, GenerationError> {
        let element = self
            .state
            .scene
            .get(id)
            .ok_or_else(|| GenerationError::UnknownElement(id.clone()))?;
        if element.is_video() != video {
            let expected = if video { "video" } else { "image" };
            return Err(GenerationError::WrongMediaKind(id.clone(), expected));
        }
        Ok(element.clone())
    }

    fn generate(&mut self) -> Result<()> {
        let settings = self.state.settings.clone();
        let prompt = non_empty(settings.prompt)?;

        let source = self
            .state
            .scene
            .iter()
            .find(|e| e.is_selected() && !e.is_video())
            .cloned();

        let placeholder = match &source {
            Some(source) => PlacedElement::image(
                ElementId::generate("generated"),
                "",
                beside(source, self.config.canvas.placement_gap),
                source.size,
            ),
            None => {
                let size = fit_within(TEXT_TO_IMAGE_SIZE, self.config.canvas.max_placement_size)
                    .unwrap_or(TEXT_TO_IMAGE_SIZE);
                PlacedElement::image(
                    ElementId::generate("generated"),
                    "",
                    centered_in_view(size, &self.state.canvas.view),
                    size,
                )
            }
        };

        let request = GenerationRequest::TextToImage {
            prompt,
            lora_url: settings.lora_url.filter(|url| !url.trim().is_empty()),
            image_size: settings.image_size,
            source_image: source.map(|s| s.src),
        };
        self.launch(placeholder.id.clone(), request, Some(placeholder))
    }

    fn video_placeholder_beside(&self, source: &PlacedElement) -> PlacedElement {
        PlacedElement::video(
            ElementId::generate("video"),
            "",
            beside(source, self.config.canvas.placement_gap),
            source.size,
            0.0,
        )
    }

    /// Registers a job and starts it. With a placeholder the result lands in a
    /// new element; without one the job edits `key` in place.
    fn launch(
        &mut self,
        key: ElementId,
        request: GenerationRequest,
        placeholder: Option<PlacedElement>,
    ) -> Result<()> {
        let kind = request.kind();
        let job = self
            .state
            .generations
            .begin(key.clone(), kind, placeholder.is_some(), Utc::now())?;

        match placeholder {
            Some(element) => {
                let element = element.with_flags(ElementFlags::GENERATING);
                if let Err(e) = self.state.scene.insert(element) {
                    self.state.generations.cancel(&key);
                    return Err(e.into());
                }
            }
            None => self.set_generating(&key, true),
        }

        self.runner.start(key.clone(), job, request);
        self.events.emit(StudioEvent::GenerationStarted {
            element_id: key,
            kind,
        });
        Ok(())
    }

    fn expire_generations(&mut self) -> usize {
        let expired = self.state.generations.expire(Utc::now());
        let count = expired.len();
        for transition in expired {
            self.runner.abort(transition.key());
            self.apply_transition(transition);
        }
        count
    }

    fn apply_transition(&mut self, transition: Transition) {
        match transition {
            Transition::Preview { key, src } => {
                if let Err(e) = self.state.scene.update(&key, |e| e.with_src(src)) {
                    tracing::debug!(element_id = %key, error = %e, "Preview for missing element");
                }
            }
            Transition::Completed {
                key,
                kind,
                src,
                duration,
            } => {
                self.runner.finish(&key);
                let updated = self.state.scene.update(&key, |e| {
                    let mut flags = e.flags;
                    flags.remove(ElementFlags::GENERATING);
                    let mut next = e.with_src(src).with_flags(flags);
                    if let (Some(d), Some(playback)) = (duration, e.playback()) {
                        next = next.with_playback(VideoPlayback {
                            duration: d,
                            ..*playback
                        });
                    }
                    next
                });

                match updated {
                    Ok(()) => {
                        tracing::info!(element_id = %key, ?kind, "Generation completed");
                        self.commit();
                        self.events.emit(StudioEvent::success(
                            format!("{} complete", kind.label()),
                            "The result is on the canvas",
                        ));
                    }
                    Err(_) => {
                        tracing::warn!(element_id = %key, ?kind, "Result arrived for an element that is gone");
                        self.events.emit(StudioEvent::info(
                            format!("{} complete", kind.label()),
                            "The target element was removed, so the result was discarded",
                        ));
                    }
                }
                self.events.emit(StudioEvent::GenerationFinished {
                    element_id: key,
                    kind,
                    success: true,
                });
            }
            Transition::Failed {
                key,
                kind,
                error,
                remove_element,
            } => {
                tracing::warn!(element_id = %key, ?kind, %error, "Generation failed");
                self.runner.finish(&key);
                self.clean_up(&key, remove_element);
                self.events
                    .emit(StudioEvent::error(format!("{} failed", kind.label()), error));
                self.events.emit(StudioEvent::GenerationFinished {
                    element_id: key,
                    kind,
                    success: false,
                });
            }
            Transition::Cancelled {
                key,
                kind,
                remove_element,
            } => {
                tracing::info!(element_id = %key, ?kind, "Generation cancelled");
                self.clean_up(&key, remove_element);
                self.events.emit(StudioEvent::GenerationFinished {
                    element_id: key,
                    kind,
                    success: false,
                });
            }
        }
    }

    /// Removes a placeholder, or clears the flag on an element edited in place.
    fn clean_up(&mut self, key: &ElementId, remove_element: bool) {
        if remove_element {
            self.state.scene.remove(key);
        } else {
            self.set_generating(key, false);
        }
        self.schedule_save();
    }
}

fn non_empty(prompt: String) -> Result<String> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("A prompt is required"));
    }
    Ok(trimmed.to_string())
}
