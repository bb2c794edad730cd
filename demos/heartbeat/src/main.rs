use nabang::Level;
use std::thread;
use std::time::Duration;

/// Emits a slow heartbeat through every recorder, then shuts the log down
/// in an orderly fashion. Run `nabang-view` from the same directory to
/// watch it live.
fn main() {
    let beats: i32 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(20);

    nabang::stamp("boot");
    nabang::set_value("beats-planned", beats);

    for beat in 0..beats {
        let _beat = nabang::scope("beat");

        nabang::trace(Level::Info, format_args!("beat {beat}"));
        nabang::set_value("beat", beat);
        nabang::add_value("beats-done", 1);

        if beat % 5 == 4 {
            nabang::trace(Level::Warn, format_args!("{} beats to go", beats - beat - 1));
        }

        thread::sleep(Duration::from_millis(100));
    }

    nabang::set_text("status", "done");
    nabang::stamp("shutdown");
    nabang::shutdown();
}
