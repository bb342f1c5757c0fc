use bytes::BytesMut;
use filterio::{Error, FilterChain};
use filterio_codec::{LengthFieldFilter, LineFramingFilter, StringFilter, TerminatorType};
use proptest::prelude::*;

fn line_chain() -> FilterChain {
    FilterChain::new()
        .with(LineFramingFilter::new(8192, true, TerminatorType::BOTH))
        .with(StringFilter::new())
}

fn binary_chain() -> FilterChain {
    FilterChain::new()
        .with(LengthFieldFilter::default())
        .with(StringFilter::new())
}

fn drain_strings(chain: &mut FilterChain) -> Result<Vec<String>, Error> {
    let mut out = vec![];
    while let Some(msg) = chain.decode()? {
        out.push(*msg.downcast::<String>().unwrap());
    }
    Ok(out)
}

#[test]
fn test_hello_world_fragments() {
    let mut chain = line_chain();
    chain.feed(b"hel");
    assert!(drain_strings(&mut chain).unwrap().is_empty());
    chain.feed(b"lo\r\nworld\r\n");
    assert_eq!(drain_strings(&mut chain).unwrap(), vec!["hello", "world"]);
}

#[test]
fn test_reply_encodes_last_filter_first() {
    let mut chain = binary_chain();
    let wire = chain.encode(Box::new("ok".to_owned())).unwrap();
    assert_eq!(&wire[..], &[0, 0, 0, 0, 2, 0, b'o', b'k']);
}

#[test]
fn test_invalid_utf8_mid_chain() {
    let mut chain = line_chain();
    chain.feed(b"\xff\xfe\n");
    assert!(matches!(
        chain.decode(),
        Err(Error::Decode { ref filter, .. }) if filter == "StringFilter"
    ));
}

#[test]
fn test_raw_bytes_through_framing_only() {
    let mut chain = FilterChain::new().with(LengthFieldFilter::new(1024));
    let wire = chain.encode(Box::new(BytesMut::from("raw"))).unwrap();
    chain.feed(&wire);
    let frame = chain.decode().unwrap().unwrap();
    assert_eq!(&frame.downcast::<BytesMut>().unwrap()[..], b"raw");
}

fn feed_in_chunks(chain: &mut FilterChain, wire: &[u8], cuts: &[prop::sample::Index]) -> Vec<String> {
    let mut points: Vec<usize> = cuts.iter().map(|i| i.index(wire.len() + 1)).collect();
    points.push(0);
    points.push(wire.len());
    points.sort_unstable();

    let mut out = vec![];
    for pair in points.windows(2) {
        chain.feed(&wire[pair[0]..pair[1]]);
        out.extend(drain_strings(chain).unwrap());
    }
    out
}

proptest! {
    #[test]
    fn line_chain_ignores_fragmentation(
        lines in prop::collection::vec("[ -~]{0,32}", 1..10),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let mut encoder = line_chain();
        let mut wire = vec![];
        for line in &lines {
            wire.extend_from_slice(&encoder.encode(Box::new(line.clone())).unwrap());
        }

        let mut chain = line_chain();
        prop_assert_eq!(feed_in_chunks(&mut chain, &wire, &cuts), lines);
    }

    #[test]
    fn binary_chain_round_trips(
        payloads in prop::collection::vec("\\PC{0,64}", 1..6),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let mut encoder = binary_chain();
        let mut wire = vec![];
        for payload in &payloads {
            wire.extend_from_slice(&encoder.encode(Box::new(payload.clone())).unwrap());
        }

        let mut chain = binary_chain();
        prop_assert_eq!(feed_in_chunks(&mut chain, &wire, &cuts), payloads);
    }
}
