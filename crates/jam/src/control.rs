use jam_core::{SessionCommand, SessionController, SessionError, HELP};

/// What the control loop should do after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Message(String),
    Quit,
}

/// Apply one control-surface command to the session.
pub fn process_command(
    controller: &SessionController,
    command: SessionCommand,
) -> Result<Reply, SessionError> {
    use SessionCommand::*;

    log::debug!("Processing command: {:?}", command);

    let message = match command {
        Start => {
            if controller.is_running() {
                "Already playing".to_string()
            } else {
                controller.start()?;
                "Jam session started".to_string()
            }
        }
        Stop => {
            if controller.is_running() {
                controller.stop();
                "Jam session stopped".to_string()
            } else {
                "Not playing".to_string()
            }
        }
        Status => controller.status().to_string(),
        SetTempo(bpm) => {
            controller.set_tempo(bpm)?;
            format!("BPM set to {}", bpm)
        }
        ToggleVoice(voice) => {
            let enabled = controller.toggle_voice(voice);
            format!("{}: {}", voice.display_name(), on_off(enabled))
        }
        SetVoiceEnabled(voice, enabled) => {
            controller.set_voice_enabled(voice, enabled);
            format!("{}: {}", voice.display_name(), on_off(enabled))
        }
        SetIntensity(voice, value) => {
            let applied = controller.set_intensity(voice, value)?;
            format!("{} intensity: {:.2}", voice.display_name(), applied)
        }
        SetKey(key_root) => {
            controller.set_key(key_root)?;
            format!("Key: {}", controller.status().key_name)
        }
        SetScale(scale) => {
            controller.set_scale(scale);
            format!("Scale: {}", scale)
        }
        SetPattern(voice, name) => {
            controller.set_pattern(voice, &name)?;
            format!("{} pattern: {}", voice.display_name(), name.to_lowercase())
        }
        Help => HELP.to_string(),
        Quit => return Ok(Reply::Quit),
    };

    Ok(Reply::Message(message))
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "OFF"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jam_core::{CaptureOutput, ScaleType, ValidationError, Voice};

    use super::*;

    fn apply(controller: &SessionController, line: &str) -> Result<Reply, SessionError> {
        process_command(controller, line.parse().unwrap())
    }

    #[test]
    fn test_setters_through_commands() {
        let controller = SessionController::default();

        assert_eq!(
            apply(&controller, "bpm 140").unwrap(),
            Reply::Message("BPM set to 140".to_string())
        );
        assert_eq!(
            apply(&controller, "toggle bass").unwrap(),
            Reply::Message("Bass: OFF".to_string())
        );
        apply(&controller, "key A").unwrap();
        apply(&controller, "scale blues").unwrap();
        apply(&controller, "pattern drum breaks").unwrap();

        let status = controller.status();
        assert_eq!(status.tempo, 140);
        assert!(!status.bass.enabled);
        assert_eq!(status.key_name, "A");
        assert_eq!(status.scale, ScaleType::Blues);
    }

    #[test]
    fn test_rejected_command_leaves_state() {
        let controller = SessionController::default();
        assert!(matches!(
            apply(&controller, "bpm 250"),
            Err(SessionError::Validation(ValidationError::Tempo(250)))
        ));
        assert_eq!(controller.params().tempo, 128);
    }

    #[test]
    fn test_start_requires_output() {
        let controller = SessionController::default();
        assert!(matches!(
            apply(&controller, "start"),
            Err(SessionError::NotConnected)
        ));
        assert_eq!(
            apply(&controller, "stop").unwrap(),
            Reply::Message("Not playing".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_quit() {
        let controller = SessionController::default();
        controller.bind_output(Arc::new(CaptureOutput::new()));

        assert_eq!(
            apply(&controller, "start").unwrap(),
            Reply::Message("Jam session started".to_string())
        );
        assert_eq!(
            apply(&controller, "start").unwrap(),
            Reply::Message("Already playing".to_string())
        );
        assert!(controller.is_running());

        apply(&controller, "stop").unwrap();
        assert!(!controller.is_running());
        assert_eq!(apply(&controller, "quit").unwrap(), Reply::Quit);
        controller.shutdown().await;
    }

    #[test]
    fn test_status_and_help() {
        let controller = SessionController::default();
        controller.set_voice_enabled(Voice::Melody, false);

        let Reply::Message(status) = apply(&controller, "status").unwrap() else {
            panic!("status should reply with text");
        };
        assert!(status.contains("Melody: OFF"));

        let Reply::Message(help) = apply(&controller, "help").unwrap() else {
            panic!("help should reply with text");
        };
        assert!(help.contains("PLAYBACK:"));
    }
}
