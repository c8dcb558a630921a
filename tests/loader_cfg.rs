use ncsdis::emit::Disassembler;
use ncsdis::game::GameId;
use ncsdis::loader::load_ncs;
use ncsdis::model::{BlockEdgeKind, ConstValue, SubRoutineKind};
use ncsdis::opcode::Opcode;

/// Assemble an NCS image from the given instruction stream.
fn image(body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(13 + body.len());
    buf.extend_from_slice(b"NCS V1.0");
    buf.push(0x42);
    buf.extend_from_slice(&((13 + body.len()) as u32).to_be_bytes());
    buf.extend_from_slice(body);
    buf
}

/// CONSTI 42; ACTION 1 1; JMP +6; RETN
fn straight_line() -> Vec<u8> {
    image(&[
        0x04, 0x03, 0x00, 0x00, 0x00, 0x2A, // 0x0D CONSTI 42
        0x05, 0x00, 0x00, 0x01, 0x01, //       0x13 ACTION PrintString 1
        0x1D, 0x00, 0x00, 0x00, 0x00, 0x06, // 0x18 JMP -> 0x1E
        0x20, 0x00, //                         0x1E RETN
    ])
}

/// JSR +8; RETN; RETN
fn one_call() -> Vec<u8> {
    image(&[
        0x1E, 0x00, 0x00, 0x00, 0x00, 0x08, // 0x0D JSR -> 0x15
        0x20, 0x00, //                         0x13 RETN
        0x20, 0x00, //                         0x15 RETN
    ])
}

#[test]
fn decodes_straight_line_program() {
    let program = load_ncs(&straight_line(), GameId::Nwn).unwrap();

    assert_eq!(program.size, 32);
    assert_eq!(program.instructions.len(), 4);

    let addresses: Vec<u32> = program.instructions.iter().map(|i| i.address).collect();
    assert_eq!(addresses, vec![0x0D, 0x13, 0x18, 0x1E]);

    let consti = &program.instructions[0];
    assert_eq!(consti.opcode, Opcode::Const);
    assert_eq!(consti.const_value, Some(ConstValue::Int(42)));
    assert_eq!(consti.bytes, vec![0x04, 0x03, 0x00, 0x00, 0x00, 0x2A]);

    let action = &program.instructions[1];
    assert_eq!(action.args, vec![1, 1]);

    // JMP and the trailing RETN break the flow.
    assert_eq!(program.instructions[2].follower, None);
    assert_eq!(program.instructions[3].follower, None);
    assert_eq!(program.instructions[0].follower, Some(1));
}

#[test]
fn straight_line_blocks_and_labels() {
    let program = load_ncs(&straight_line(), GameId::Nwn).unwrap();

    assert_eq!(program.blocks.len(), 2);
    assert_eq!(program.blocks[0].children_types, vec![BlockEdgeKind::Unconditional]);
    assert_eq!(program.subroutines.len(), 1);
    assert_eq!(program.subroutines[0].kind, SubRoutineKind::Start);

    let listing = Disassembler::new(&program).listing(false).unwrap();
    assert!(listing.contains("_start:\n"));
    assert!(listing.contains("loc_0000001e:\n"));
    assert!(listing.contains("JMP loc_0000001e\n"));
    assert!(listing.contains("ACTION PrintString 1\n"));
    assert!(listing.contains("CONSTI 42\n"));
    assert!(listing.starts_with("; 32 bytes, 4 instructions\n\n"));
}

#[test]
fn call_discovers_subroutines() {
    let program = load_ncs(&one_call(), GameId::Nwn).unwrap();

    assert_eq!(program.blocks.len(), 3);
    assert_eq!(
        program.blocks[0].children_types,
        vec![BlockEdgeKind::SubRoutineCall, BlockEdgeKind::SubRoutineTail]
    );

    assert_eq!(program.subroutines.len(), 2);
    assert_eq!(program.subroutines[0].kind, SubRoutineKind::Start);
    assert_eq!(program.subroutines[1].kind, SubRoutineKind::Normal);
    assert_eq!(program.subroutines[1].address, 0x15);

    let listing = Disassembler::new(&program).listing(false).unwrap();
    assert!(listing.contains("JSR fn_00000015\n"));
    assert!(listing.contains("fn_00000015:\n"));

    // The call edge shows up cross-subroutine in the dot output.
    let dot = Disassembler::new(&program).dot(false).unwrap();
    assert!(dot.contains("  b0000000D_0 -> b00000015_0 [ color=cyan constraint=false ]\n"));
    assert!(dot.contains("cluster_s0000000D"));
    assert!(dot.contains("cluster_s00000015"));
}

#[test]
fn rejects_bad_magic() {
    let mut buf = straight_line();
    buf[0] = b'X';
    assert!(load_ncs(&buf, GameId::Nwn).is_err());
}

#[test]
fn rejects_size_mismatch() {
    let mut buf = straight_line();
    buf[12] = buf[12].wrapping_add(1);
    assert!(load_ncs(&buf, GameId::Nwn).is_err());
}

#[test]
fn rejects_truncated_instruction() {
    // CONSTI missing its operand bytes.
    let buf = image(&[0x04, 0x03, 0x00]);
    assert!(load_ncs(&buf, GameId::Nwn).is_err());
}

#[test]
fn rejects_misaligned_branch_target() {
    // JMP into the middle of the RETN-RETN pair... offset 7 lands between
    // instruction boundaries.
    let buf = image(&[
        0x1D, 0x00, 0x00, 0x00, 0x00, 0x07, // JMP -> 0x14 (no boundary)
        0x20, 0x00, 0x20, 0x00,
    ]);
    assert!(load_ncs(&buf, GameId::Nwn).is_err());
}

#[test]
fn loader_programs_have_no_stack_analysis() {
    let program = load_ncs(&one_call(), GameId::Nwn).unwrap();
    assert!(!program.has_stack_analysis);

    // No stack dumps and no signatures, even when requested.
    let listing = Disassembler::new(&program).listing(true).unwrap();
    assert!(!listing.contains(".--- Stack"));
    assert!(!listing.contains("fn_00000015: ;"));
}
