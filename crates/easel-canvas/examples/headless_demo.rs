use easel_canvas::history::{HistoryManager, HistoryState};
use easel_canvas::input::{InputState, MouseButtons};
use easel_canvas::model::{ElementId, PlacedElement, SceneGraph};
use easel_canvas::persistence::to_storage;
use easel_canvas::placement::{centered_in_view, fit_within};
use easel_canvas::{Canvas, CanvasConfig, LogicEvent};
use glam::Vec2;

fn main() {
    println!("=== Easel Headless Demo ===");

    // 1. Initialize Canvas
    let config = CanvasConfig::default();
    let mut canvas = Canvas::new(config);
    canvas.update_canvas_size(Vec2::new(1280.0, 720.0));

    // 2. Place two images the way a drop would
    let mut scene = SceneGraph::new();
    for (name, natural) in [
        ("landscape", Vec2::new(1600.0, 900.0)),
        ("portrait", Vec2::new(600.0, 900.0)),
    ] {
        let Some(size) = fit_within(natural, canvas.config.max_placement_size) else {
            continue;
        };
        let position = centered_in_view(size, &canvas.view) + Vec2::new(scene.len() as f32 * 320.0, 0.0);
        let element = PlacedElement::image(
            ElementId::generate("image"),
            format!("https://cdn.example/{name}.png"),
            position,
            size,
        );
        println!("  - {name}: {} at {:?} size {:?}", element.id, position, size);
        if let Err(e) = scene.insert(element) {
            eprintln!("insert failed: {e}");
        }
    }

    // 3. Initialize History
    let mut history = HistoryManager::new(canvas.config.history_limit);
    history.record(HistoryState::capture(&scene));

    // 4. Simulate a drag on the first image
    let Some(first) = scene.iter().next().map(|e| e.bounds().center()) else {
        return;
    };
    let frames = [
        (first, true),
        (first + Vec2::new(40.0, 0.0), true),
        (first + Vec2::new(80.0, 25.0), true),
        (first + Vec2::new(80.0, 25.0), false),
    ];

    for (frame, (pos, left)) in frames.into_iter().enumerate() {
        let input = InputState {
            mouse_pos: canvas.view.canvas_to_screen(pos),
            mouse_buttons: MouseButtons {
                left,
                ..Default::default()
            },
            ..Default::default()
        };
        let events = canvas.update(&input, &mut scene);
        println!("\n--- Frame {frame} ---");
        println!("Mode: {:?}", canvas.interaction_mode);
        for event in events {
            if let LogicEvent::ElementsMoved { ids, delta } = &event {
                println!(">> Moved {} element(s) by {delta:?}", ids.len());
                history.record(HistoryState::capture(&scene));
            }
        }
    }

    // 5. Undo the move
    if let Some(state) = history.undo() {
        scene = state.restore();
        println!("\n>> Undo restored {} element(s)", scene.len());
    }

    // 6. Serialize
    let stored = to_storage(&scene, canvas.viewport(), 0);
    println!("\nStored {} element(s):", stored.elements.len());
    for element in &stored.elements {
        println!(
            "  - {} z={} at ({}, {})",
            element.id, element.z_index, element.transform.x, element.transform.y
        );
    }
}
