use genome_traversal::{AlignmentCursor, Cigar, CigarOp, CigarOpKind};
use proptest::prelude::*;

fn op(kind: CigarOpKind) -> impl Strategy<Value = CigarOp> {
    (1u32..12).prop_map(move |len| CigarOp::new(kind, len))
}

// Clips on the outside, a match on both ends of the reference span, and any
// gap or insertion in between followed by another match.
fn cigar() -> impl Strategy<Value = Cigar> {
    let gap = prop_oneof![
        op(CigarOpKind::Insertion),
        op(CigarOpKind::Deletion),
        op(CigarOpKind::Skip),
        op(CigarOpKind::Match),
    ];
    (
        proptest::option::of(op(CigarOpKind::HardClip)),
        proptest::option::of(op(CigarOpKind::SoftClip)),
        op(CigarOpKind::Match),
        proptest::collection::vec((gap, op(CigarOpKind::Match)), 0..6),
        proptest::option::of(op(CigarOpKind::SoftClip)),
    )
        .prop_map(|(hard, soft, first, middle, tail)| {
            let mut ops: Vec<CigarOp> = hard.into_iter().chain(soft).collect();
            ops.push(first);
            for (gap, matched) in middle {
                ops.push(gap);
                ops.push(matched);
            }
            ops.extend(tail);
            Cigar::new(ops)
        })
}

proptest! {
    #[test]
    fn cursor_moves_one_reference_base_at_a_time(cigar in cigar(), start in 1u64..100_000) {
        let mut cursor = AlignmentCursor::new(cigar.ops(), start).unwrap();
        let mut steps = 0u64;
        let mut last_read_offset = cursor.read_offset();
        while let Some(kind) = cursor.step_forward() {
            prop_assert!(matches!(
                kind,
                CigarOpKind::Match | CigarOpKind::Deletion | CigarOpKind::Skip
            ));
            prop_assert_eq!(cursor.genome_offset() as u64, steps);
            prop_assert_eq!(cursor.genome_position(), Some(start + steps));
            prop_assert!(cursor.read_offset() >= last_read_offset);
            if kind == CigarOpKind::Match {
                prop_assert!(cursor.read_offset() > last_read_offset);
            } else {
                prop_assert_eq!(cursor.read_offset(), last_read_offset);
            }
            last_read_offset = cursor.read_offset();
            steps += 1;
        }
        prop_assert_eq!(steps, cigar.reference_length());
        prop_assert!(cursor.is_done());
        prop_assert_eq!(cursor.read_offset() + 1, cigar.read_length() as i32);
        prop_assert_eq!(cursor.step_forward(), None);
    }
}

#[test]
fn gaps_at_the_ends_are_rejected() {
    for text in ["3D5M", "5M2N", "2S4D5M", ""] {
        let cigar: Cigar = text.parse().unwrap_or_else(|_| Cigar::new(Vec::new()));
        assert!(AlignmentCursor::new(cigar.ops(), 1).is_err(), "{text} should be rejected");
    }
}
