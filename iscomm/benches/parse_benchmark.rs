use criterion::{criterion_group, criterion_main, Criterion};
use iscomm::*;

/// Mixed stream of ISB data packets, UBX frames and NMEA sentences
fn sample_stream() -> Vec<u8> {
    let mut rx = [0u8; 64];
    let mut tx = vec![0u8; constants::PKT_BUF_SIZE];
    let mut comm = CommInstance::new(&mut rx, &mut tx);
    let ubx_ack = [0xb5, 0x62, 0x05, 0x01, 0x02, 0x00, 0x06, 0x01, 0x0f, 0x38];
    let nmea = b"$GPZDA*48\r\n";

    let mut stream = vec![];
    for i in 0..200u32 {
        let data: Vec<u8> = (0..96).map(|b| (b as u32 + i) as u8).collect();
        stream.extend_from_slice(comm.set_data(4, 0, &data).unwrap());
        stream.extend_from_slice(&ubx_ack);
        stream.extend_from_slice(nmea);
    }
    stream
}

fn parse_all(comm: &mut CommInstance<'_>, data: &[u8], chunk_size: usize) -> usize {
    let mut count = 0;
    for chunk in data.chunks(chunk_size) {
        comm.free();
        comm.receive(chunk).unwrap();
        loop {
            match comm.parse() {
                ProtocolType::None => break,
                ProtocolType::ParseError => {
                    panic!("No errors allowed! got: {:?}", comm.last_error());
                },
                _ => count += 1,
            }
        }
    }
    count
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let data = sample_stream();

    c.bench_function("parse_byte_by_byte", |b| {
        let mut rx = vec![0u8; 2048];
        let mut tx = [0u8; 16];
        b.iter(|| {
            let mut comm = CommInstance::new(&mut rx, &mut tx);
            let count = data
                .iter()
                .filter(|&&byte| comm.parse_byte(byte).is_frame())
                .count();
            assert_eq!(count, 600);
        })
    });

    for chunk in &[64, 256, 1024] {
        c.bench_function(&format!("parse_chunks_{}", chunk), |b| {
            let mut rx = vec![0u8; 4096];
            let mut tx = [0u8; 16];
            b.iter(|| {
                let mut comm = CommInstance::new(&mut rx, &mut tx);
                assert_eq!(parse_all(&mut comm, &data, *chunk), 600);
            })
        });
    }

    c.bench_function("encode_data_packet", |b| {
        let mut rx = [0u8; 16];
        let mut tx = vec![0u8; constants::PKT_BUF_SIZE];
        let mut comm = CommInstance::new(&mut rx, &mut tx);
        let data = [0xfeu8; 256];
        b.iter(|| comm.set_data(4, 0, &data).map(|frame| frame.len()).unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
