//! Output actuator - the focus and shutter lines to the camera.
//!
//! Both lines are plain push-pull outputs, active high.  The actuator
//! remembers the level it last drove, so asserting an asserted line (or
//! releasing a released one) is a no-op - the classifier is free to repeat
//! itself.

use embedded_hal::digital::OutputPin;

use crate::error::Error;
use crate::gesture::GestureEvent;

/// The two physical outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Line {
    Focus,
    Shutter,
}

impl Line {
    pub const fn as_str(self) -> &'static str {
        match self {
            Line::Focus => "focus",
            Line::Shutter => "shutter",
        }
    }
}

pub struct OutputActuator<F, S> {
    focus: F,
    shutter: S,
    focus_high: bool,
    shutter_high: bool,
}

impl<F: OutputPin, S: OutputPin> OutputActuator<F, S> {
    /// Take ownership of the pins and drive both low.
    pub fn new(mut focus: F, mut shutter: S) -> Result<Self, Error> {
        focus.set_low().map_err(|_| Error::Output(Line::Focus))?;
        shutter.set_low().map_err(|_| Error::Output(Line::Shutter))?;
        Ok(Self {
            focus,
            shutter,
            focus_high: false,
            shutter_high: false,
        })
    }

    pub fn is_asserted(&self, line: Line) -> bool {
        match line {
            Line::Focus => self.focus_high,
            Line::Shutter => self.shutter_high,
        }
    }

    pub fn assert(&mut self, line: Line) -> Result<(), Error> {
        self.set(line, true)
    }

    pub fn deassert(&mut self, line: Line) -> Result<(), Error> {
        self.set(line, false)
    }

    /// Drive the line for one classifier event.
    pub fn apply(&mut self, event: GestureEvent) -> Result<(), Error> {
        self.set(event.line(), event.asserts())
    }

    /// Release both lines.
    pub fn release_all(&mut self) -> Result<(), Error> {
        self.deassert(Line::Focus)?;
        self.deassert(Line::Shutter)
    }

    fn set(&mut self, line: Line, high: bool) -> Result<(), Error> {
        if self.is_asserted(line) == high {
            return Ok(());
        }
        match line {
            Line::Focus => drive(&mut self.focus, high).map_err(|_| Error::Output(line))?,
            Line::Shutter => drive(&mut self.shutter, high).map_err(|_| Error::Output(line))?,
        }
        match line {
            Line::Focus => self.focus_high = high,
            Line::Shutter => self.shutter_high = high,
        }
        Ok(())
    }
}

fn drive<P: OutputPin>(pin: &mut P, high: bool) -> Result<(), P::Error> {
    if high {
        pin.set_high()
    } else {
        pin.set_low()
    }
}
