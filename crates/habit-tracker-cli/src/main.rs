#![forbid(unsafe_code)]

fn main() {
    std::process::exit(habit_tracker_cli::run());
}
