use crate::core::transport::{DeviceInfo, DevicePicker};
use std::io::{self, BufRead, Write};

/// Asks on the terminal which device to use.
///
/// A single candidate is taken without asking. An empty answer or `q`
/// cancels the selection.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptPicker;

impl PromptPicker {
    fn choose<R: BufRead, W: Write>(
        candidates: &[DeviceInfo],
        input: &mut R,
        output: &mut W,
    ) -> Option<DeviceInfo> {
        match candidates {
            [] => return None,
            [only] => return Some(only.clone()),
            _ => {}
        }

        let _ = writeln!(output, "Select a serial device:");
        for (i, device) in candidates.iter().enumerate() {
            let _ = writeln!(output, "  {}) {}", i + 1, device);
        }

        loop {
            let _ = write!(output, "Device [1-{}, q to cancel]: ", candidates.len());
            let _ = output.flush();

            let mut answer = String::new();
            match input.read_line(&mut answer) {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }

            let answer = answer.trim();
            if answer.is_empty() || answer.eq_ignore_ascii_case("q") {
                return None;
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=candidates.len()).contains(&n) => {
                    return Some(candidates[n - 1].clone())
                }
                _ => {
                    let _ = writeln!(output, "Invalid choice: {}", answer);
                }
            }
        }
    }
}

impl DevicePicker for PromptPicker {
    fn pick(&self, candidates: &[DeviceInfo]) -> Option<DeviceInfo> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        Self::choose(candidates, &mut input, &mut io::stderr())
    }
}
