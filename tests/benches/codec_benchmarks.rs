//! # AlterBFT Codec Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Wire codec | Encode and decode proposals carrying a block certificate |
//! | Verifier | First-time and cached signature checks |
//! | Blockchain | Add a chain of blocks and commit its tip |

use alter_consensus::adapters::{Ed25519Signer, SignatureVerifier};
use alter_consensus::domain::{Proposal, Signature, Vote};
use alter_consensus::{Block, Blockchain, Certificate, Message, MessageSigner, ProcessId};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

fn signers(n: usize) -> Vec<Ed25519Signer> {
    (0..n as ProcessId)
        .map(|p| Ed25519Signer::from_seed(alter_tests::seed(p)))
        .collect()
}

fn signed_proposal(signers: &[Ed25519Signer], value_size: usize) -> Message {
    let parent = Block::genesis(vec![0xAB; value_size]);
    let mut certificate = Certificate::block(0, parent.id(), parent.height());
    let payload = certificate.payload();
    for (process, signer) in signers.iter().enumerate() {
        certificate.add_signature(process as ProcessId, signer.sign(&payload));
    }
    let mut proposal = Message::Propose(Proposal {
        epoch: 1,
        block: Block::child_of(&parent, vec![0xCD; value_size]),
        certificate: Some(certificate),
        sender: 1,
        sender_fwd: 1,
        signature: Signature::EMPTY,
    });
    if let Some(payload) = proposal.signing_payload() {
        proposal.set_signature(signers[1].sign(&payload));
    }
    proposal
}

// ============================================================================
// Wire codec
// ============================================================================

fn bench_message_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("wire-codec");
    let signers = signers(16);

    for value_size in [64usize, 1024, 16 * 1024] {
        let proposal = signed_proposal(&signers, value_size);
        let encoded = proposal.encode();
        group.throughput(Throughput::Bytes(encoded.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("encode_proposal", value_size),
            &proposal,
            |b, proposal| b.iter(|| black_box(proposal.encode())),
        );
        group.bench_with_input(
            BenchmarkId::new("decode_proposal", value_size),
            &encoded,
            |b, encoded| b.iter(|| black_box(Message::decode(encoded).is_ok())),
        );
    }
    group.finish();
}

// ============================================================================
// Signature verification
// ============================================================================

fn bench_verifier(c: &mut Criterion) {
    let mut group = c.benchmark_group("verifier");
    group.measurement_time(Duration::from_secs(5));

    for n in [4usize, 16, 64] {
        let signers = signers(n);
        let keys: Vec<_> = signers.iter().map(Ed25519Signer::verifying_key).collect();
        let encoded = signed_proposal(&signers, 256).encode();
        group.throughput(Throughput::Elements(n as u64 + 1));

        group.bench_with_input(BenchmarkId::new("uncached", n), &encoded, |b, encoded| {
            b.iter(|| {
                let verifier = SignatureVerifier::new(keys.clone(), 1024);
                black_box(verifier.verify(encoded).is_ok())
            })
        });

        let warm = SignatureVerifier::new(keys.clone(), 1024);
        let _ = warm.verify(&encoded);
        group.bench_with_input(BenchmarkId::new("cached", n), &encoded, |b, encoded| {
            b.iter(|| black_box(warm.verify(encoded).is_ok()))
        });
    }

    let signer = Ed25519Signer::from_seed(alter_tests::seed(0));
    let block = Block::genesis(b"vote".to_vec());
    let mut vote = Message::Vote(Vote {
        epoch: 7,
        height: block.height(),
        block_id: block.id(),
        sender: 0,
        signature: Signature::EMPTY,
        sender2: 0,
        signature2: None,
    });
    if let Some(payload) = vote.signing_payload() {
        vote.set_signature(signer.sign(&payload));
    }
    let encoded = vote.encode();
    group.bench_function("vote_uncached", |b| {
        b.iter(|| {
            let verifier = SignatureVerifier::new(vec![signer.verifying_key()], 1);
            black_box(verifier.verify(&encoded).is_ok())
        })
    });
    group.finish();
}

// ============================================================================
// Blockchain window
// ============================================================================

fn bench_blockchain(c: &mut Criterion) {
    let mut group = c.benchmark_group("blockchain");

    for length in [10usize, 100, 1000] {
        let mut chain = vec![Block::genesis(b"b0".to_vec())];
        for i in 1..length {
            let child = Block::child_of(&chain[i - 1], format!("b{i}").into_bytes());
            chain.push(child);
        }
        group.throughput(Throughput::Elements(length as u64));

        group.bench_with_input(BenchmarkId::new("add_and_commit", length), &chain, |b, chain| {
            b.iter(|| {
                let mut blockchain = Blockchain::new(2000);
                for block in chain {
                    blockchain.add_block(block);
                }
                black_box(blockchain.commit(&chain[length - 1]).len())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_message_codec, bench_verifier, bench_blockchain);
criterion_main!(benches);
