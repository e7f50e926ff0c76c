use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use emu_core::cpu::Memory6502;
use emu_f256::{Machine, MachineConfig};

fn machine() -> Machine {
    let mut m = Machine::new(MachineConfig::default());
    // Window 2 remapped so reads go through a non-identity entry
    m.write(0x0000, 0x80);
    m.write(0x000A, 0x21);
    m.write(0x0000, 0x00);
    m
}

fn set_le(m: &mut Machine, addr: u16, value: u32, width: u16) {
    for i in 0..width {
        m.write(addr + i, (value >> (8 * i)) as u8);
    }
}

fn bench_mapped_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("f256_bus");

    group.bench_function("mapped_read_page", |b| {
        let mut m = machine();
        b.iter(|| {
            let mut sum = 0u32;
            for addr in 0x4000..0x4100u16 {
                sum += m.read(addr) as u32;
            }
            black_box(sum);
        });
    });

    group.bench_function("mapped_write_page", |b| {
        let mut m = machine();
        b.iter(|| {
            for addr in 0x4000..0x4100u16 {
                m.write(addr, addr as u8);
            }
        });
    });

    group.bench_function("io_window_read_page", |b| {
        let mut m = machine();
        b.iter(|| {
            let mut sum = 0u32;
            for addr in 0xD000..0xD100u16 {
                sum += m.read(addr) as u32;
            }
            black_box(sum);
        });
    });

    group.finish();
}

fn bench_dma(c: &mut Criterion) {
    let mut group = c.benchmark_group("f256_dma");

    for count in [256u32, 4096, 65536].iter() {
        group.bench_with_input(BenchmarkId::new("linear_copy", count), count, |b, &count| {
            let mut m = machine();
            set_le(&mut m, 0xDF04, 0x1_0000, 3);
            set_le(&mut m, 0xDF08, 0x2_0000, 3);
            set_le(&mut m, 0xDF0C, count, 3);
            b.iter(|| {
                m.write(0xDF00, 0x80);
                black_box(m.physical_memory()[0x2_0000]);
            });
        });
    }

    group.bench_function("rect_fill_320x240", |b| {
        let mut m = machine();
        set_le(&mut m, 0xDF08, 0x1_0000, 3);
        set_le(&mut m, 0xDF0C, 320, 2);
        set_le(&mut m, 0xDF0E, 240, 2);
        set_le(&mut m, 0xDF12, 320, 2);
        b.iter(|| {
            m.write(0xDF01, 0x20);
            m.write(0xDF00, 0x86);
        });
    });

    group.finish();
}

fn bench_frame_sync(c: &mut Criterion) {
    c.bench_function("f256_synchronize", |b| {
        let mut m = machine();
        m.write(0xD658, 0x01);
        b.iter(|| {
            m.queue_key_event(0x1C);
            black_box(m.synchronize());
        });
    });
}

criterion_group!(benches, bench_mapped_access, bench_dma, bench_frame_sync);
criterion_main!(benches);
