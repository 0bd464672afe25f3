//! MIDI output ports via midir: directory listing, port selection, and a
//! [`NoteSink`] that writes raw channel messages.

use midir::{MidiOutput, MidiOutputConnection};

use crate::output::{NoteSink, OutputError};

const CLIENT_NAME: &str = "ringdrift";
const CONNECTION_NAME: &str = "ringdrift-out";

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;

/// Information about an available MIDI output port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiPortInfo {
    pub index: usize,
    pub name: String,
}

/// Enumerate the MIDI output ports currently visible to the system.
pub fn list_output_ports() -> Result<Vec<MidiPortInfo>, OutputError> {
    let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| OutputError::Init(e.to_string()))?;
    let ports = midi_out
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_out
                .port_name(port)
                .ok()
                .map(|name| MidiPortInfo { index, name })
        })
        .collect();
    Ok(ports)
}

/// Pick a port by index (`"2"`) or by case-insensitive name substring.
pub fn find_port<'a>(ports: &'a [MidiPortInfo], selector: &str) -> Option<&'a MidiPortInfo> {
    let selector = selector.trim();
    if let Ok(index) = selector.parse::<usize>() {
        return ports.iter().find(|p| p.index == index);
    }
    let wanted = selector.to_lowercase();
    ports
        .iter()
        .find(|p| p.name.to_lowercase().contains(&wanted))
}

pub fn note_on_message(channel: u8, key: u8, velocity: u8) -> [u8; 3] {
    [NOTE_ON | (channel & 0x0F), key & 0x7F, velocity & 0x7F]
}

pub fn note_off_message(channel: u8, key: u8, velocity: u8) -> [u8; 3] {
    [NOTE_OFF | (channel & 0x0F), key & 0x7F, velocity & 0x7F]
}

/// An open connection to one MIDI output port.
pub struct MidiPortSink {
    connection: MidiOutputConnection,
    port_name: String,
}

impl MidiPortSink {
    /// Open the port matching `selector` (see [`find_port`]).
    pub fn open(selector: &str) -> Result<Self, OutputError> {
        let midi_out =
            MidiOutput::new(CLIENT_NAME).map_err(|e| OutputError::Init(e.to_string()))?;
        let ports = midi_out.ports();
        let infos: Vec<MidiPortInfo> = ports
            .iter()
            .enumerate()
            .map(|(index, port)| MidiPortInfo {
                index,
                name: midi_out
                    .port_name(port)
                    .unwrap_or_else(|_| "Unknown".to_string()),
            })
            .collect();
        let info = find_port(&infos, selector)
            .ok_or_else(|| OutputError::PortNotFound(selector.to_string()))?
            .clone();

        let connection = midi_out
            .connect(&ports[info.index], CONNECTION_NAME)
            .map_err(|e| OutputError::Connect(e.to_string()))?;
        log::info!(target: "midi", "connected to output port {} ({})", info.index, info.name);

        Ok(Self {
            connection,
            port_name: info.name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn send(&mut self, message: &[u8]) -> Result<(), OutputError> {
        self.connection
            .send(message)
            .map_err(|e| OutputError::Send(e.to_string()))
    }
}

impl NoteSink for MidiPortSink {
    fn note_on(&mut self, channel: u8, key: u8, velocity: u8) -> Result<(), OutputError> {
        self.send(&note_on_message(channel, key, velocity))
    }

    fn note_off(&mut self, channel: u8, key: u8, velocity: u8) -> Result<(), OutputError> {
        self.send(&note_off_message(channel, key, velocity))
    }
}
