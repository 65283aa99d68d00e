#![no_main]
use libfuzzer_sys::fuzz_target;

use numalloc::{Buffer, Facade, FacadeConfig, FailingBackend, HandleState, SilentSink};

const SLOTS: usize = 8;

fuzz_target!(|data: &[u8]| {
    // Each 4-byte chunk: op, slot, little-endian count. A limited backend
    // exercises the refusal paths through the try_ surface.
    if data.len() < 4 {
        return;
    }

    let facade = Facade::from_parts(
        FailingBackend::after(usize::from(data[0])),
        SilentSink,
        FacadeConfig::new(),
    );
    let mut handles: Vec<Buffer<u32, FailingBackend, SilentSink>> =
        (0..SLOTS).map(|_| facade.buffer("fuzz")).collect();
    let mut models: Vec<Option<Vec<u32>>> = vec![None; SLOTS];

    for chunk in data[1..].chunks_exact(4) {
        let op = chunk[0] % 4;
        let slot = usize::from(chunk[1]) % SLOTS;
        let count = usize::from(u16::from_le_bytes([chunk[2], chunk[3]])) % 4096;
        let handle = &mut handles[slot];

        match op {
            0 => {
                if let Ok(region) = handle.try_allocate(count) {
                    for (i, v) in region.iter_mut().enumerate() {
                        *v = i as u32;
                    }
                    models[slot] = Some((0..count as u32).collect());
                }
            }
            1 => {
                if handle.try_zero_allocate(count).is_ok() {
                    models[slot] = Some(vec![0; count]);
                }
            }
            2 => {
                if handle.try_resize(count).is_ok() {
                    models[slot].get_or_insert_with(Vec::new).resize(count, 0);
                }
            }
            _ => {
                handle.release();
                models[slot] = None;
            }
        }

        match &models[slot] {
            None => assert_eq!(handles[slot].state(), HandleState::Empty),
            Some(model) => assert_eq!(handles[slot].as_slice(), model.as_slice()),
        }
    }
});
