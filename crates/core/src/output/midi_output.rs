use midir::{MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;

use super::traits::NoteOutput;
use crate::error::{PortError, TransportError};
use crate::midi::midi::MidiMessage;

const CLIENT_NAME: &str = "jam_session";
const CONNECTION_NAME: &str = "jam-output";

/// A live connection to a hardware or virtual MIDI output port.
pub struct MidiPortOutput {
    port_name: String,
    connection: Mutex<MidiOutputConnection>,
}

impl MidiPortOutput {
    /// Connect to the first output port whose name contains `port_match`.
    pub fn connect(port_match: &str) -> Result<Self, PortError> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;

        let (out_port, port_name) = midi_out
            .ports()
            .into_iter()
            .find_map(|port| {
                midi_out
                    .port_name(&port)
                    .ok()
                    .filter(|name| name.contains(port_match))
                    .map(|name| (port, name))
            })
            .ok_or_else(|| PortError::NotFound(port_match.to_string()))?;

        let connection = midi_out
            .connect(&out_port, CONNECTION_NAME)
            .map_err(|e| PortError::Connect {
                port: port_name.clone(),
                reason: e.to_string(),
            })?;

        log::info!("Connected to MIDI output '{}'", port_name);
        Ok(Self {
            port_name,
            connection: Mutex::new(connection),
        })
    }

    /// Create a virtual output port other applications can subscribe to.
    #[cfg(unix)]
    pub fn create_virtual(port_name: &str) -> Result<Self, PortError> {
        use midir::os::unix::VirtualOutput;

        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let connection = midi_out
            .create_virtual(port_name)
            .map_err(|e| PortError::Connect {
                port: port_name.to_string(),
                reason: e.to_string(),
            })?;

        log::info!("Created virtual MIDI output '{}'", port_name);
        Ok(Self {
            port_name: port_name.to_string(),
            connection: Mutex::new(connection),
        })
    }

    #[cfg(not(unix))]
    pub fn create_virtual(_port_name: &str) -> Result<Self, PortError> {
        Err(PortError::VirtualUnsupported)
    }

    /// Reuse an existing port if one matches, otherwise publish a virtual one.
    pub fn connect_or_create(port_match: &str, virtual_name: &str) -> Result<Self, PortError> {
        match Self::connect(port_match) {
            Ok(output) => Ok(output),
            Err(PortError::NotFound(_)) => {
                log::info!(
                    "No MIDI output matching '{}', creating virtual port '{}'",
                    port_match,
                    virtual_name
                );
                Self::create_virtual(virtual_name)
            }
            Err(e) => Err(e),
        }
    }
}

impl NoteOutput for MidiPortOutput {
    fn name(&self) -> &str {
        &self.port_name
    }

    fn send(&self, message: MidiMessage) -> Result<(), TransportError> {
        self.connection
            .lock()
            .send(&message.to_bytes())
            .map_err(|e| TransportError::Send {
                port: self.port_name.clone(),
                reason: e.to_string(),
            })
    }
}

/// Names of all MIDI output ports currently visible.
pub fn list_output_ports() -> Result<Vec<String>, PortError> {
    let midi_out = MidiOutput::new(CLIENT_NAME)?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect())
}
