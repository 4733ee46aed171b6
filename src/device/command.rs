//! Typed shell-command builder for the debug bridge.
//!
//! Commands render to an exec-style argument vector; nothing is ever
//! spliced into a shell string, and phone numbers are reduced to dialable
//! characters before they reach the device.

/// One device-side shell invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// Launch the dialer with a call intent.
    Dial {
        /// Number to dial; sanitized on render.
        number: String,
    },
    /// Open the SMS app with a pre-filled message.
    ComposeSms {
        /// Destination number; sanitized on render.
        number: String,
        /// Message body, passed as a single argument.
        body: String,
    },
    /// End the current call.
    Hangup,
    /// Dump the UI hierarchy to stdout.
    UiDump,
    /// Dump battery state.
    BatteryStatus,
    /// Dump the telephony registry (call-state signal, primary).
    DumpTelephonyRegistry,
    /// Dump the telecom stack (call-state signal, secondary).
    DumpTelecom,
    /// Tap a screen coordinate.
    Tap {
        /// X coordinate in pixels.
        x: i32,
        /// Y coordinate in pixels.
        y: i32,
    },
}

impl ShellCommand {
    /// Renders the argument vector passed to `adb shell`.
    pub fn argv(&self) -> Vec<String> {
        match self {
            Self::Dial { number } => vec![
                "am".into(),
                "start".into(),
                "-a".into(),
                "android.intent.action.CALL".into(),
                "-d".into(),
                format!("tel:{}", sanitize_number(number)),
            ],
            Self::ComposeSms { number, body } => vec![
                "am".into(),
                "start".into(),
                "-a".into(),
                "android.intent.action.SENDTO".into(),
                "-d".into(),
                format!("sms:{}", sanitize_number(number)),
                "--es".into(),
                "sms_body".into(),
                body.clone(),
            ],
            Self::Hangup => vec!["input".into(), "keyevent".into(), "KEYCODE_ENDCALL".into()],
            Self::UiDump => vec!["uiautomator".into(), "dump".into(), "/dev/tty".into()],
            Self::BatteryStatus => vec!["dumpsys".into(), "battery".into()],
            Self::DumpTelephonyRegistry => {
                vec!["dumpsys".into(), "telephony.registry".into()]
            }
            Self::DumpTelecom => vec!["dumpsys".into(), "telecom".into()],
            Self::Tap { x, y } => {
                vec!["input".into(), "tap".into(), x.to_string(), y.to_string()]
            }
        }
    }
}

/// Keeps digits and a leading `+`; drops everything else.
pub fn sanitize_number(number: &str) -> String {
    number
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}
