use std::os::windows::process::CommandExt;
use std::process::Command;
use winapi::um::winbase::CREATE_NO_WINDOW;

pub fn hide_console_window(cmd: &mut Command) {
    cmd.creation_flags(CREATE_NO_WINDOW);
}
