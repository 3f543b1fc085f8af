pub mod console;

pub use console::{listen, print_command_menu, print_info_menu, print_intro, ConsoleCommand};
