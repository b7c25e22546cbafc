//! Property tests: every pixel a frame changes is covered by the rectangles
//! published for that frame, and the UI copy matches the live surface.

use std::sync::Arc;

use proptest::prelude::*;
use spectrum_bridge::event::display_channel;
use spectrum_bridge::{
    BridgeConfig, DisplayDispatcher, DisplayEvent, Rect, RenderScale, ScreenSync,
    SurfaceRenderer, TextureSurface,
};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 32;

#[derive(Debug, Clone)]
enum Draw {
    PutPixel(u32, u32, u8),
    Plot8(u32, u32, u8, u8, u8),
    Plot16(u32, u32, u16, u8, u8),
    Area(u32, u32, u32, u32),
}

fn draw_strategy() -> impl Strategy<Value = Draw> {
    // Coordinates run a little past the image to exercise clipping.
    prop_oneof![
        (0..72u32, 0..36u32, any::<u8>()).prop_map(|(x, y, c)| Draw::PutPixel(x, y, c)),
        (0..72u32, 0..36u32, any::<u8>(), 0..16u8, 0..16u8)
            .prop_map(|(x, y, d, i, p)| Draw::Plot8(x, y, d, i, p)),
        (0..72u32, 0..36u32, any::<u16>(), 0..16u8, 0..16u8)
            .prop_map(|(x, y, d, i, p)| Draw::Plot16(x, y, d, i, p)),
        (0..72u32, 0..36u32, 0..16u32, 0..8u32).prop_map(|(x, y, w, h)| Draw::Area(x, y, w, h)),
    ]
}

fn apply(display: &mut DisplayDispatcher, draw: &Draw) {
    match *draw {
        Draw::PutPixel(x, y, c) => display.put_pixel(x, y, c),
        Draw::Plot8(x, y, d, i, p) => display.plot8(x, y, d, i, p),
        Draw::Plot16(x, y, d, i, p) => display.plot16(x, y, d, i, p),
        Draw::Area(x, y, w, h) => display.area(x, y, w, h),
    }
}

fn live_copy(renderer: &Arc<parking_lot::Mutex<SurfaceRenderer>>) -> TextureSurface {
    renderer.lock().live().cloned().expect("display initialised")
}

fn check_frames(scale: RenderScale, frames: &[Vec<Draw>]) -> Result<(), TestCaseError> {
    let screen = Arc::new(ScreenSync::new(1, 1, 16).expect("valid"));
    let config = BridgeConfig {
        scale,
        dirty_capacity: 8,
        ..BridgeConfig::default()
    };
    let renderer = Arc::new(parking_lot::Mutex::new(SurfaceRenderer::new(
        config,
        Arc::clone(&screen),
    )));
    let (tx, rx) = display_channel();
    renderer.lock().set_events(Some(tx));
    let mut display = DisplayDispatcher::for_renderer(Arc::clone(&renderer));

    prop_assert!(display.init(WIDTH, HEIGHT));
    display.frame_end();
    rx.try_iter().for_each(drop);

    for draws in frames {
        let before = live_copy(&renderer);
        for draw in draws {
            apply(&mut display, draw);
        }
        let after = live_copy(&renderer);
        display.frame_end();

        let published: Vec<Rect> = rx
            .try_iter()
            .filter_map(|event| match event {
                DisplayEvent::FrameReady { dirty, .. } => Some(dirty),
                _ => None,
            })
            .flatten()
            .collect();

        for y in 0..after.height() {
            for x in 0..after.width() {
                if before.pixel(x, y) != after.pixel(x, y) {
                    prop_assert!(
                        published.iter().any(|r| r.contains_point(x, y)),
                        "changed pixel ({x}, {y}) not in {published:?}"
                    );
                }
            }
        }

        let guard = renderer.lock();
        let live = guard.live().expect("display initialised");
        prop_assert!(!live.dirty().is_dirty());
        screen.consume(|ui| {
            for y in 0..live.height() {
                prop_assert_eq!(ui.row(y), live.row(y));
            }
            Ok(())
        })?;
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_changes_are_published_at_normal_scale(
        frames in prop::collection::vec(prop::collection::vec(draw_strategy(), 0..40), 1..4)
    ) {
        check_frames(RenderScale::Normal, &frames)?;
    }

    #[test]
    fn prop_changes_are_published_at_double_scale(
        frames in prop::collection::vec(prop::collection::vec(draw_strategy(), 0..40), 1..4)
    ) {
        check_frames(RenderScale::Double, &frames)?;
    }
}
