//! Lid sensor line (KY-033 reflective sensor, pulled up, high = lid open).
//!
//! The GPIO interrupt fires on every edge and only records it in
//! [`LID_EDGES`]. Level reads and debouncing happen on the poll loop.

use core::cell::RefCell;

use critical_section::Mutex;
use esp_hal::{
    gpio::{Event, Input, InputConfig, InputPin, Io, Pull},
    handler, ram,
};
use focus_core::sensors::EdgeCell;
use log::info;

use crate::platform::clock::now_ms;

/// Edge mailbox written by [`lid_edge_handler`].
pub static LID_EDGES: EdgeCell = EdgeCell::new();

static LID_PIN: Mutex<RefCell<Option<Input<'static>>>> = Mutex::new(RefCell::new(None));

#[handler]
#[ram]
fn lid_edge_handler() {
    let now = now_ms();
    critical_section::with(|cs| {
        if let Some(pin) = LID_PIN.borrow_ref_mut(cs).as_mut()
            && pin.is_interrupt_set()
        {
            pin.clear_interrupt();
            LID_EDGES.on_raw_edge(now);
        }
    });
}

/// Poll-side handle to the interrupt-owned lid pin.
#[derive(Debug)]
pub struct LidSwitch {
    _private: (),
}

impl LidSwitch {
    /// Configures the pin, installs the GPIO handler and starts listening
    /// for both edges.
    pub fn install(io: &mut Io<'_>, pin: impl InputPin + 'static) -> Self {
        let mut input = Input::new(pin, InputConfig::default().with_pull(Pull::Up));
        io.set_interrupt_handler(lid_edge_handler);

        critical_section::with(|cs| {
            input.listen(Event::AnyEdge);
            LID_PIN.borrow_ref_mut(cs).replace(input);
        });

        let switch = Self { _private: () };
        info!("lid: interrupt armed open={}", switch.is_open());
        switch
    }

    /// Current raw level; `true` while the lid is open.
    pub fn is_open(&self) -> bool {
        critical_section::with(|cs| {
            LID_PIN
                .borrow_ref(cs)
                .as_ref()
                .is_some_and(|pin| pin.is_high())
        })
    }

    pub fn edges(&self) -> &'static EdgeCell {
        &LID_EDGES
    }
}
