use super::*;

const ADDR: u32 = 0x10;

// One clock cycle: sample the combinational response, then the edge.
fn cycle(reg: &mut SharedRegister, req: BusRequest) -> BusResponse {
    let resp = reg.respond(&req);
    reg.clock(&req);
    resp
}

fn read_back(reg: &mut SharedRegister, address: u32) -> BusResponse {
    cycle(reg, BusRequest::read(address));
    cycle(reg, BusRequest::idle(address))
}

// Deterministic spread of test words (boundaries first).
fn sample_words() -> Vec<u32> {
    let mut words = vec![0, 1, 0x8000_0000, 0xFFFF_FFFF, 0x5555_5555, 0xAAAA_AAAA];
    let mut x: u32 = 0x1234_5678;
    for _ in 0..32 {
        x = x.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        words.push(x);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_after_reset_returns_default() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 0xDEAD_BEEF));
        reg.reset();
        cycle(&mut reg, BusRequest::idle(ADDR));

        let resp = read_back(&mut reg, ADDR);
        assert!(resp.data_valid);
        assert_eq!(resp.data, 0xDEAD_BEEF);
    }

    #[test]
    fn test_bus_write_then_read() {
        // byte offset 0x40
        let word = crate::regport::byte_to_word(0x40).unwrap();
        let mut reg = SharedRegister::new(RegisterConfig::read_write(word, 0));

        let resp = cycle(&mut reg, BusRequest::write(word, 0x1234_5678));
        assert!(resp.ready);
        assert_eq!(reg.value(), 0x1234_5678);

        let resp = read_back(&mut reg, word);
        assert!(resp.data_valid);
        assert_eq!(resp.data, 0x1234_5678);
    }

    #[test]
    fn test_round_trip_all_sample_words() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 0));
        for v in sample_words() {
            cycle(&mut reg, BusRequest::write(ADDR, v));
            let resp = read_back(&mut reg, ADDR);
            assert_eq!(resp.data, v);
        }
    }

    #[test]
    fn test_local_write_wins_same_cycle() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 0));
        reg.local_write(0x2222_2222);
        cycle(&mut reg, BusRequest::write(ADDR, 0x1111_1111));

        assert_eq!(reg.value(), 0x2222_2222);
        assert_eq!(reg.events().priority_conflicts, 1);
    }

    #[test]
    fn test_priority_over_many_values() {
        let words = sample_words();
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 0));
        for (bus, local) in words.iter().zip(words.iter().rev()) {
            reg.local_write(*local);
            cycle(&mut reg, BusRequest::write(ADDR, *bus));
            assert_eq!(reg.value(), *local);
        }
    }

    #[test]
    fn test_local_write_alone() {
        let mut reg = SharedRegister::new(RegisterConfig::read_only(ADDR, 0));
        reg.local_write(0x0000_BEEF);
        cycle(&mut reg, BusRequest::idle(0));
        assert_eq!(reg.value(), 0x0000_BEEF);
        // local writes never look like bus writes
        assert!(!reg.local_write_request());
    }

    #[test]
    fn test_constant_ignores_local_write() {
        let mut reg = SharedRegister::new(RegisterConfig::constant(ADDR, 42));
        reg.local_write(7);
        cycle(&mut reg, BusRequest::idle(ADDR));
        assert_eq!(reg.value(), 42);
    }

    #[test]
    fn test_read_only_never_changes_or_notifies() {
        let mut reg = SharedRegister::new(RegisterConfig::read_only(ADDR, 0x0F0F_0F0F));
        for v in sample_words() {
            cycle(&mut reg, BusRequest::write(ADDR, v));
            assert_eq!(reg.value(), 0x0F0F_0F0F);
            assert!(!reg.local_write_request());
        }
        assert_eq!(reg.events().read_only_writes, sample_words().len() as u64);
    }

    #[test]
    fn test_data_valid_pulses_one_cycle() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 9));
        let before = cycle(&mut reg, BusRequest::read(ADDR));
        assert!(!before.data_valid);

        let pulse = cycle(&mut reg, BusRequest::idle(ADDR));
        assert!(pulse.data_valid);
        assert_eq!(pulse.data, 9);

        let after = cycle(&mut reg, BusRequest::idle(ADDR));
        assert!(!after.data_valid);
        assert_eq!(after.data, 0);
    }

    #[test]
    fn test_wrong_address_never_responds() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 0xFFFF_FFFF));
        for address in [0, ADDR - 1, ADDR + 1, 0xFFFF] {
            let resp = read_back(&mut reg, address);
            assert!(!resp.data_valid);
            assert_eq!(resp.data, 0);
            assert!(resp.ready);
        }
    }

    #[test]
    fn test_write_notification_pulse() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 0));
        cycle(&mut reg, BusRequest::write(ADDR, 5));
        assert!(reg.local_write_request());
        cycle(&mut reg, BusRequest::idle(ADDR));
        assert!(!reg.local_write_request());

        // reads do not notify
        cycle(&mut reg, BusRequest::read(ADDR));
        assert!(!reg.local_write_request());
    }

    #[test]
    fn test_reset_restores_default_anywhere() {
        for v in sample_words() {
            let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 0xDEAD_BEEF));
            cycle(&mut reg, BusRequest::write(ADDR, v));
            reg.reset();
            cycle(&mut reg, BusRequest::idle(ADDR));

            let resp = read_back(&mut reg, ADDR);
            assert_eq!(resp.data, 0xDEAD_BEEF);
        }
    }

    #[test]
    fn test_no_write_serviced_during_reset() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 1));
        cycle(&mut reg, BusRequest::write(ADDR, 2));
        reg.reset();
        cycle(&mut reg, BusRequest::write(ADDR, 3));
        assert_eq!(reg.value(), 1);
        assert!(!reg.local_write_request());
        assert_eq!(reg.outputs(), RegisterOutputs::default());
    }

    #[test]
    fn test_immediate_mode_always_ready() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 0));
        for req in [
            BusRequest::write(ADDR, 1),
            BusRequest::idle(ADDR),
            BusRequest::read(ADDR),
            BusRequest::idle(ADDR),
        ] {
            assert!(cycle(&mut reg, req).ready);
        }
    }

    #[test]
    fn test_ack_mode_holds_ready_until_ack() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 7).with_ack());

        let c0 = cycle(&mut reg, BusRequest::read(ADDR));
        assert!(c0.ready);

        let c1 = cycle(&mut reg, BusRequest::idle(ADDR));
        assert!(!c1.ready);
        assert!(c1.data_valid);
        assert_eq!(c1.data, 7);

        for _ in 0..3 {
            assert!(!cycle(&mut reg, BusRequest::idle(ADDR)).ready);
        }

        reg.acknowledge();
        let ack_cycle = cycle(&mut reg, BusRequest::idle(ADDR));
        assert!(!ack_cycle.ready);

        let after = cycle(&mut reg, BusRequest::idle(ADDR));
        assert!(after.ready);
    }

    #[test]
    fn test_ack_mode_not_ready_only_when_addressed() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 0).with_ack());
        cycle(&mut reg, BusRequest::write(ADDR, 1));
        assert!(reg.is_waiting_ack());
        assert!(!reg.respond(&BusRequest::idle(ADDR)).ready);
        assert!(reg.respond(&BusRequest::idle(ADDR + 1)).ready);
    }

    #[test]
    fn test_ack_mode_still_notifies_writes() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 0).with_ack());
        cycle(&mut reg, BusRequest::write(ADDR, 0x77));
        assert!(reg.local_write_request());
        assert_eq!(reg.value(), 0x77);
        cycle(&mut reg, BusRequest::idle(ADDR));
        assert!(!reg.local_write_request());
    }

    #[test]
    fn test_ack_mode_latches_strobe_while_waiting() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 0).with_ack());
        cycle(&mut reg, BusRequest::write(ADDR, 1));

        // single-pulse requester strobes while not ready
        let resp = cycle(&mut reg, BusRequest::read(ADDR));
        assert!(!resp.ready);
        assert!(reg.has_pending_strobe());

        reg.acknowledge();
        cycle(&mut reg, BusRequest::idle(ADDR));
        assert!(!reg.is_waiting_ack());

        // serviced on the first ready cycle
        let resp = cycle(&mut reg, BusRequest::idle(ADDR));
        assert!(resp.ready);
        assert!(!reg.has_pending_strobe());
        let resp = cycle(&mut reg, BusRequest::idle(ADDR));
        assert!(resp.data_valid);
        assert_eq!(resp.data, 1);
    }

    #[test]
    fn test_ack_mode_merges_held_strobe() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 0).with_ack());
        cycle(&mut reg, BusRequest::write(ADDR, 1));
        assert!(reg.local_write_request());

        let mut pulses = 0;
        let held = BusRequest::write(ADDR, 2);
        for n in 0..6 {
            if n == 2 {
                reg.acknowledge();
            }
            let resp = cycle(&mut reg, held);
            if reg.local_write_request() {
                pulses += 1;
            }
            if resp.ready {
                break;
            }
        }
        assert_eq!(pulses, 1);
        assert_eq!(reg.value(), 2);
        assert!(reg.is_waiting_ack());
    }

    #[test]
    fn test_ack_mode_read_only_write_does_not_wait() {
        let mut reg = SharedRegister::new(RegisterConfig::read_only(ADDR, 3).with_ack());
        cycle(&mut reg, BusRequest::write(ADDR, 4));
        assert!(!reg.is_waiting_ack());
        assert!(cycle(&mut reg, BusRequest::idle(ADDR)).ready);
    }

    #[test]
    fn test_reset_clears_ack_wait_keeps_latched_read() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 0x0D0D_0D0D).with_ack());
        cycle(&mut reg, BusRequest::write(ADDR, 1));
        cycle(&mut reg, BusRequest::read(ADDR));
        assert!(reg.has_pending_strobe());

        reg.reset();
        cycle(&mut reg, BusRequest::idle(ADDR));
        assert!(!reg.is_waiting_ack());
        assert!(reg.has_pending_strobe());
        assert!(reg.respond(&BusRequest::idle(ADDR)).ready);

        // the latched read is served with the default value
        cycle(&mut reg, BusRequest::idle(ADDR));
        let out = reg.outputs();
        assert!(out.data_valid);
        assert_eq!(out.data, 0x0D0D_0D0D);
        assert!(!reg.has_pending_strobe());
    }

    #[test]
    fn test_read_strobe_on_reset_edge_served_after() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 0xDEAD_BEEF));
        cycle(&mut reg, BusRequest::write(ADDR, 5));
        reg.reset();
        cycle(&mut reg, BusRequest::read(ADDR));
        assert!(!reg.outputs().data_valid);

        cycle(&mut reg, BusRequest::idle(ADDR));
        assert!(reg.outputs().data_valid);
        assert_eq!(reg.outputs().data, 0xDEAD_BEEF);
    }

    #[test]
    fn test_drive_local_keeps_staged_reset() {
        let mut reg = SharedRegister::new(RegisterConfig::read_write(ADDR, 3));
        cycle(&mut reg, BusRequest::write(ADDR, 9));
        reg.reset();
        reg.drive_local(LocalInputs {
            ack: true,
            ..LocalInputs::default()
        });
        cycle(&mut reg, BusRequest::idle(ADDR));
        assert_eq!(reg.value(), 3);
    }
}
