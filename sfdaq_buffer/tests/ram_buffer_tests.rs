//! Ring buffer behaviour across writers, readers and handles

use proptest::prelude::*;
use sfdaq_buffer::{BufferError, BufferLayout, BufferResult, RamBuffer};
use sfdaq_common::formats::ModuleFrame;

const N_MODULES: usize = 3;
const N_SLOTS: usize = 10;
const MODULE_BYTES: usize = 4096;
const PACKETS: usize = 128;

fn unique(name: &str) -> String {
    format!("{}_{}", name, std::process::id())
}

fn create(name: &str) -> BufferResult<RamBuffer> {
    let layout = BufferLayout::new(N_MODULES, N_SLOTS, MODULE_BYTES, PACKETS)?;
    RamBuffer::create(&unique(name), layout)
}

fn complete_frame(module_id: u64, pulse_id: u64) -> ModuleFrame {
    ModuleFrame {
        pulse_id,
        frame_index: pulse_id + 10,
        daq_rec: 1,
        n_recv_packets: PACKETS as u64,
        module_id,
    }
}

fn write_all_modules(buffer: &RamBuffer, pulse_id: u64) -> BufferResult<()> {
    for module_id in 0..N_MODULES as u64 {
        let mut writer = buffer.module_writer(module_id)?;
        let data = vec![module_id as u8 + 1; MODULE_BYTES];
        writer.write_frame(&complete_frame(module_id, pulse_id), &data)?;
    }
    Ok(())
}

#[test]
fn test_write_and_assemble_image() -> BufferResult<()> {
    let buffer = create("rb_it_assemble")?;
    let pulse_id = 123523;
    write_all_modules(&buffer, pulse_id)?;

    let image = buffer.assemble_image(pulse_id);
    assert!(image.is_good_image);
    assert_eq!(image.pulse_id, pulse_id);
    assert_eq!(image.frame_index, pulse_id + 10);
    assert_eq!(image.daq_rec, 1);

    let mut data = vec![0u8; MODULE_BYTES];
    for module_id in 0..N_MODULES as u64 {
        let meta = buffer.read_frame(pulse_id, module_id, &mut data)?;
        assert_eq!(meta, complete_frame(module_id, pulse_id));
        assert!(data.iter().all(|&b| b == module_id as u8 + 1));
    }
    Ok(())
}

#[test]
fn test_read_image_is_module_ordered() -> BufferResult<()> {
    let buffer = create("rb_it_image")?;
    write_all_modules(&buffer, 77)?;

    let mut image = vec![0u8; N_MODULES * MODULE_BYTES];
    buffer.read_image(77, &mut image)?;
    for (module, chunk) in image.chunks(MODULE_BYTES).enumerate() {
        assert!(chunk.iter().all(|&b| b == module as u8 + 1));
    }

    // Same slot residue, same bytes.
    let mut aliased = vec![0u8; N_MODULES * MODULE_BYTES];
    buffer.read_image(77 + N_SLOTS as u64, &mut aliased)?;
    assert_eq!(aliased, image);
    Ok(())
}

#[test]
fn test_empty_slot_is_not_good() -> BufferResult<()> {
    let buffer = create("rb_it_empty")?;
    let image = buffer.assemble_image(5);
    assert!(!image.is_good_image);
    assert_eq!(image.pulse_id, 0);
    assert_eq!(image.frame_index, 0);
    assert_eq!(image.daq_rec, 0);
    Ok(())
}

#[test]
fn test_incomplete_module_marks_image_bad() -> BufferResult<()> {
    let buffer = create("rb_it_incomplete")?;
    let pulse_id = 1000;
    write_all_modules(&buffer, pulse_id)?;

    let mut writer = buffer.module_writer(1)?;
    let mut partial = complete_frame(1, pulse_id);
    partial.n_recv_packets = PACKETS as u64 - 1;
    writer.write_frame(&partial, &vec![0u8; MODULE_BYTES])?;

    let image = buffer.assemble_image(pulse_id);
    assert!(!image.is_good_image);
    // Still seeded by the complete modules.
    assert_eq!(image.pulse_id, pulse_id);
    Ok(())
}

#[test]
fn test_module_disagreement_marks_image_bad() -> BufferResult<()> {
    let buffer = create("rb_it_mismatch")?;
    let pulse_id = 2000;
    write_all_modules(&buffer, pulse_id)?;

    let mut writer = buffer.module_writer(2)?;
    let mut other = complete_frame(2, pulse_id);
    other.frame_index += 1;
    writer.write_frame(&other, &vec![0u8; MODULE_BYTES])?;

    assert!(!buffer.assemble_image(pulse_id).is_good_image);
    Ok(())
}

#[test]
fn test_stale_slot_is_not_good() -> BufferResult<()> {
    let buffer = create("rb_it_stale")?;
    let old_pulse = 3003;
    write_all_modules(&buffer, old_pulse)?;

    // Same slot, a pulse that was never written.
    let new_pulse = old_pulse + N_SLOTS as u64;
    let image = buffer.assemble_image(new_pulse);
    assert!(!image.is_good_image);
    assert_eq!(image.pulse_id, old_pulse);

    assert!(buffer.assemble_image(old_pulse).is_good_image);
    Ok(())
}

#[test]
fn test_newer_pulse_overwrites_slot() -> BufferResult<()> {
    let buffer = create("rb_it_overwrite")?;
    write_all_modules(&buffer, 4)?;
    write_all_modules(&buffer, 4 + N_SLOTS as u64)?;

    assert!(!buffer.assemble_image(4).is_good_image);
    let image = buffer.assemble_image(4 + N_SLOTS as u64);
    assert!(image.is_good_image);
    assert_eq!(image.pulse_id, 4 + N_SLOTS as u64);
    Ok(())
}

#[test]
fn test_attached_handle_sees_writes_and_claims() -> BufferResult<()> {
    let name = unique("rb_it_attach");
    let layout = BufferLayout::new(N_MODULES, N_SLOTS, MODULE_BYTES, PACKETS)?;
    let owner = RamBuffer::create(&name, layout)?;
    let attached = RamBuffer::attach(&name)?;

    assert!(!attached.is_owner());
    assert_eq!(attached.layout(), owner.layout());
    assert_eq!(attached.owner_pid(), std::process::id());

    let mut writer = attached.module_writer(0)?;
    writer.write_frame(&complete_frame(0, 42), &vec![9u8; MODULE_BYTES])?;

    // The claim is visible through the owner's mapping as well.
    assert!(matches!(
        owner.module_writer(0),
        Err(BufferError::ModuleClaimed { module_id: 0 })
    ));

    let mut data = vec![0u8; MODULE_BYTES];
    let meta = owner.read_frame(42, 0, &mut data)?;
    assert_eq!(meta.pulse_id, 42);
    assert!(data.iter().all(|&b| b == 9));

    drop(writer);
    attached.release()?;

    // Releasing an attached handle leaves the region in place.
    assert!(RamBuffer::attach(&name).is_ok());
    owner.release()?;
    assert!(matches!(
        RamBuffer::attach(&name),
        Err(BufferError::NotFound { .. })
    ));
    Ok(())
}

#[test]
fn test_create_is_exclusive() -> BufferResult<()> {
    let name = unique("rb_it_exclusive");
    let layout = BufferLayout::new(1, 1, 64, 1)?;
    let _owner = RamBuffer::create(&name, layout)?;
    assert!(matches!(
        RamBuffer::create(&name, layout),
        Err(BufferError::AlreadyExists { .. })
    ));
    Ok(())
}

#[test]
fn test_concurrent_module_writers() -> BufferResult<()> {
    let buffer = create("rb_it_threads")?;
    let n_pulses = 200u64;

    std::thread::scope(|scope| {
        for module_id in 0..N_MODULES as u64 {
            let buffer = &buffer;
            scope.spawn(move || {
                let mut writer = buffer.module_writer(module_id).unwrap();
                for pulse_id in 0..n_pulses {
                    let data = vec![(pulse_id as u8) ^ (module_id as u8); MODULE_BYTES];
                    writer
                        .write_frame(&complete_frame(module_id, pulse_id), &data)
                        .unwrap();
                }
            });
        }
    });

    // The last N_SLOTS pulses survive in the ring.
    let mut pixels = vec![0u8; N_MODULES * MODULE_BYTES];
    for pulse_id in n_pulses - N_SLOTS as u64..n_pulses {
        let image = buffer.assemble_image(pulse_id);
        assert!(image.is_good_image, "pulse {pulse_id} not good");
        assert_eq!(image.pulse_id, pulse_id);

        buffer.read_image(pulse_id, &mut pixels)?;
        for (module, chunk) in pixels.chunks(MODULE_BYTES).enumerate() {
            let expected = (pulse_id as u8) ^ (module as u8);
            assert!(chunk.iter().all(|&b| b == expected));
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_read_returns_last_write(
        pulse_id in 0u64..1_000_000,
        frame_index in any::<u64>(),
        daq_rec in any::<u64>(),
        fill in any::<u8>(),
        module_id in 0u64..N_MODULES as u64,
    ) {
        let buffer = create("rb_it_prop").unwrap();
        let meta = ModuleFrame {
            pulse_id,
            frame_index,
            daq_rec,
            n_recv_packets: PACKETS as u64,
            module_id,
        };
        buffer
            .module_writer(module_id)
            .unwrap()
            .write_frame(&meta, &vec![fill; MODULE_BYTES])
            .unwrap();

        let mut data = vec![0u8; MODULE_BYTES];
        let read = buffer.read_frame(pulse_id, module_id, &mut data).unwrap();
        prop_assert_eq!(read, meta);
        prop_assert!(data.iter().all(|&b| b == fill));
    }
}
