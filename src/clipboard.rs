//! Best-effort clipboard transport for `--copy`. Plain Linux/macOS/Windows go through `arboard`;
//! under WSL, where no clipboard is wired up to the kernel, we shell out to the Windows
//! `clip.exe` instead, transcoding the text to CP932 since that's what it expects there.

use encoding_rs::SHIFT_JIS;
use std::io::Write;
use std::process::{Command, Stdio};

/// Detects WSL by checking the kernel release string for "microsoft" (what WSL1/2 both report).
fn is_wsl() -> bool {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|release| release.to_lowercase().contains("microsoft"))
        .unwrap_or(false)
}

/// Copies `text` to the system clipboard, printing a confirmation or failure message the way the
/// CLI's other best-effort steps do. Never returns an error — a clipboard miss is not fatal.
pub fn copy_to_clipboard(text: &str) {
    if is_wsl() {
        match copy_via_clip_exe(text) {
            Ok(()) => println!(">> Code copied to clipboard (WSL mode)."),
            Err(e) => println!(">> Copy failed: {}", e),
        }
        return;
    }

    match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text.to_string())) {
        Ok(()) => println!(">> Code copied to clipboard."),
        Err(e) => println!(">> Copy failed: {}", e),
    }
}

fn copy_via_clip_exe(text: &str) -> std::io::Result<()> {
    let (encoded, _, _) = SHIFT_JIS.encode(text);

    let mut child = Command::new("clip.exe").stdin(Stdio::piped()).spawn()?;
    child.stdin.take().expect("piped stdin").write_all(&encoded)?;
    child.wait()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_text_round_trips_through_shift_jis() {
        let (encoded, _, had_errors) = SHIFT_JIS.encode("print('hello')\n");
        assert!(!had_errors);
        assert_eq!(encoded.as_ref(), b"print('hello')\n");
    }
}
