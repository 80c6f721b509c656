//! I/O instructions and the device registers they talk to
//!
//! Instructions `700` to `777` address one of 128 devices, selected by bits 3-9 of the
//! instruction word, and perform one of eight functions selected by bits 10-12.

use bitflags::bitflags;
use parse_display::Display;
use thiserror::Error;
use tracing::debug;

use super::exception::Fault;
use super::word::Word;
use super::{Computer, Effect, Instruction};

/// A device does not implement the requested function
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unsupported device function")]
pub struct Unsupported;

/// The registers of an I/O device
///
/// Every function defaults to being unsupported, which the processor reports as an
/// unimplemented instruction.
pub trait Device {
    /// Mnemonic used in disassembly, like `PI`
    fn name(&self) -> &'static str;

    /// Bring the device back to its power-on state
    fn reset(&mut self) {}

    /// Conditions out
    ///
    /// # Errors
    ///
    /// Fails if the device has no control register.
    fn cono(&mut self, _value: Word) -> Result<(), Unsupported> {
        Err(Unsupported)
    }

    /// Conditions in
    ///
    /// # Errors
    ///
    /// Fails if the device has no status register.
    fn coni(&self) -> Result<Word, Unsupported> {
        Err(Unsupported)
    }

    /// Data out
    ///
    /// # Errors
    ///
    /// Fails if the device has no data register.
    fn datao(&mut self, _value: Word) -> Result<(), Unsupported> {
        Err(Unsupported)
    }

    /// Data in
    ///
    /// # Errors
    ///
    /// Fails if the device has no data register.
    fn datai(&self) -> Result<Word, Unsupported> {
        Err(Unsupported)
    }
}

bitflags! {
    /// Command bits of a `CONO PI,`
    ///
    /// Only the first command found, in declaration order, is performed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct PiCommand: u64 {
        const CLEAR = 0o10000;
        const ON = 0o200;
        const OFF = 0o400;
        const DROP_REQUESTS = 0o20000;
        const INITIATE = 0o4000;
        const LEVELS_OFF = 0o1000;
        const LEVELS_ON = 0o2000;
    }
}

/// Levels selected by a command, level 1 in the highest bit
const LEVELS_MASK: u64 = 0o177;

/// The bit of an interrupt level in the level masks
const fn level_bit(level: u8) -> u8 {
    1 << (7 - level)
}

/// Priority interrupt system, device `004`
///
/// Level masks hold level 1, the highest priority, in bit `0o100` and level 7 in bit `0o1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorityInterrupt {
    pub enabled: bool,
    pub levels_enabled: u8,
    pub requested: u8,
    pub in_progress: u8,
}

impl PriorityInterrupt {
    /// The level which would be interrupting now, if any
    ///
    /// A request is only considered if the system and its level are on, and no level of equal or
    /// higher priority is in progress.
    #[must_use]
    pub fn pending_level(self) -> Option<u8> {
        if !self.enabled {
            return None;
        }

        let candidates = self.requested & self.levels_enabled;
        let level = (1..=7).find(|&level| candidates & level_bit(level) != 0)?;
        let blocked = (1..=level).any(|higher| self.in_progress & level_bit(higher) != 0);
        (!blocked).then_some(level)
    }
}

impl Device for PriorityInterrupt {
    fn name(&self) -> &'static str {
        "PI"
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn cono(&mut self, value: Word) -> Result<(), Unsupported> {
        let command = PiCommand::from_bits_truncate(value.right());
        let levels = (value.right() & LEVELS_MASK) as u8;
        debug!(?command, levels, "PI command");

        if command.contains(PiCommand::CLEAR) {
            self.reset();
        } else if command.contains(PiCommand::ON) {
            self.enabled = true;
        } else if command.contains(PiCommand::OFF) {
            self.enabled = false;
        } else if command.contains(PiCommand::DROP_REQUESTS) {
            self.requested &= !levels;
        } else if command.contains(PiCommand::INITIATE) {
            self.requested |= levels;
        } else if command.contains(PiCommand::LEVELS_OFF) {
            self.levels_enabled &= !levels;
        } else if command.contains(PiCommand::LEVELS_ON) {
            self.levels_enabled |= levels;
        }
        Ok(())
    }

    fn coni(&self) -> Result<Word, Unsupported> {
        Ok(Word::new(
            (u64::from(self.requested) << 18)
                | (u64::from(self.in_progress) << 8)
                | (u64::from(self.enabled) << 7)
                | u64::from(self.levels_enabled),
        ))
    }
}

/// A device which exists but whose registers are not emulated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NamedDevice {
    code: u16,
    name: &'static str,
}

impl Device for NamedDevice {
    fn name(&self) -> &'static str {
        self.name
    }
}

const NAMED_DEVICES: [NamedDevice; 5] = [
    NamedDevice {
        code: 0o000,
        name: "APR",
    },
    NamedDevice {
        code: 0o010,
        name: "PAG",
    },
    NamedDevice {
        code: 0o014,
        name: "CCA",
    },
    NamedDevice {
        code: 0o020,
        name: "TIM",
    },
    NamedDevice {
        code: 0o024,
        name: "MTR",
    },
];

/// Any device code nothing is connected to: reads zero, ignores writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Absent;

impl Device for Absent {
    fn name(&self) -> &'static str {
        "NXD"
    }

    fn cono(&mut self, _value: Word) -> Result<(), Unsupported> {
        Ok(())
    }

    fn coni(&self) -> Result<Word, Unsupported> {
        Ok(Word::ZERO)
    }

    fn datao(&mut self, _value: Word) -> Result<(), Unsupported> {
        Ok(())
    }

    fn datai(&self) -> Result<Word, Unsupported> {
        Ok(Word::ZERO)
    }
}

const PI: u16 = 0o004;

/// Every device on the I/O bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Devices {
    pub pi: PriorityInterrupt,
    named: [NamedDevice; 5],
    absent: Absent,
}

impl Default for Devices {
    fn default() -> Self {
        Self {
            pi: PriorityInterrupt::default(),
            named: NAMED_DEVICES,
            absent: Absent,
        }
    }
}

impl Devices {
    /// The device answering to a device code, like `0o004` for the PI
    #[must_use]
    pub fn device(&self, code: u16) -> &dyn Device {
        if code == PI {
            return &self.pi;
        }
        if let Some(device) = self.named.iter().find(|device| device.code == code) {
            return device;
        }
        &self.absent
    }

    pub fn device_mut(&mut self, code: u16) -> &mut dyn Device {
        if code == PI {
            return &mut self.pi;
        }
        if let Some(device) = self.named.iter_mut().find(|device| device.code == code) {
            return device;
        }
        &mut self.absent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "UPPERCASE")]
pub enum IoFunction {
    Blki,
    Datai,
    Blko,
    Datao,
    Cono,
    Coni,
    Consz,
    Conso,
}

impl IoFunction {
    /// Decode the three function bits
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        match bits & 0o7 {
            0 => Self::Blki,
            1 => Self::Datai,
            2 => Self::Blko,
            3 => Self::Datao,
            4 => Self::Cono,
            5 => Self::Coni,
            6 => Self::Consz,
            _ => Self::Conso,
        }
    }
}

/// Device code of an I/O instruction, as written in assembly
const fn device_code(word: Word) -> u16 {
    (((word.bits() >> 26) & 0o177) * 4) as u16
}

const fn function(word: Word) -> IoFunction {
    IoFunction::from_bits(word.bits() >> 23)
}

pub(crate) fn io(cpu: &mut Computer, inst: &Instruction) -> Result<Effect, Fault> {
    let code = device_code(inst.word);
    let function = function(inst.word);
    let name = cpu.devices.device(code).name();
    let fail = || Fault::UnimplementedOpcode {
        opcode: inst.opcode(),
        mnemonic: format!("{function} {name},"),
        pc: inst.pc.address(),
    };
    debug!(code, %function, device = name, "I/O instruction");

    match function {
        IoFunction::Blki | IoFunction::Blko => Err(fail()),

        IoFunction::Datai => {
            let value = cpu.devices.device(code).datai().map_err(|_| fail())?;
            cpu.write(inst.ea.location(), value)?;
            Ok(Effect::Continue)
        }

        IoFunction::Datao => {
            let value = cpu.read(inst.ea.location())?;
            if cpu.devices.device_mut(code).datao(value).is_err() {
                return Err(fail());
            }
            Ok(Effect::Continue)
        }

        IoFunction::Cono => {
            let value = Computer::read_immediate(&inst.ea);
            if cpu.devices.device_mut(code).cono(value).is_err() {
                return Err(fail());
            }
            Ok(Effect::Continue)
        }

        IoFunction::Coni => {
            let value = cpu.devices.device(code).coni().map_err(|_| fail())?;
            cpu.write(inst.ea.location(), value)?;
            Ok(Effect::Continue)
        }

        IoFunction::Consz | IoFunction::Conso => {
            let value = cpu.devices.device(code).coni().map_err(|_| fail())?;
            let any = value.bits() & inst.ea.offset() != 0;
            let skip = match function {
                IoFunction::Conso => any,
                _ => !any,
            };
            Ok(if skip { Effect::Skip } else { Effect::Continue })
        }
    }
}
