mod common;

mod tests {
    use myrtio_strip_mux::chipset::WS2812_TIMING;
    use myrtio_strip_mux::encoder::{ClocklessPlan, decode_pulses};
    use myrtio_strip_mux::{
        ChannelId, Chipset, ColorOrder, ConfigurationError, ControllerConfig, Duration,
        OutputTarget, Protocol, StripController, StripStatus, TransmitError, Waveform, encode,
    };
    use smart_leds::RGB8;

    use crate::common::{Fault, PARLIO, RMT, SPI, Sim, SimPlatform};

    const WS2812: Protocol = Chipset::Ws2812.protocol();

    /// Three RGB pixels encode to 72 pulses; four to 96
    fn fail_four_pixel_strips(waveform: &Waveform) -> Option<Fault> {
        (waveform.len() == 96).then_some(Fault::Fail(TransmitError::Hardware))
    }

    fn hang_four_pixel_strips(waveform: &Waveform) -> Option<Fault> {
        (waveform.len() == 96).then_some(Fault::Hang)
    }

    #[test]
    fn test_five_strips_share_two_channels() {
        let sim = Sim::new();
        let mut platform = SimPlatform::new(&sim, 2, RMT);
        let mut buffers = [[0u8; 9]; 5];
        let mut controller = StripController::<_, _, 8, 2>::new(platform.pool());

        let ids: Vec<_> = buffers
            .iter_mut()
            .enumerate()
            .map(|(pin, pixels)| {
                controller
                    .register_strip(OutputTarget::Pin(pin as u8), pixels, WS2812)
                    .unwrap()
            })
            .collect();
        assert_eq!(controller.strip_count(), 5);

        let result = controller.show();
        assert!(result.is_success());
        assert_eq!(result.success_count(), 5);
        assert_eq!(result.elapsed(), Duration::from_millis(30));

        let channels: Vec<_> = ids
            .iter()
            .map(|&id| result.report(id).unwrap().channel)
            .collect();
        assert_eq!(
            channels,
            vec![
                Some(ChannelId(0)),
                Some(ChannelId(1)),
                Some(ChannelId(0)),
                Some(ChannelId(1)),
                Some(ChannelId(0)),
            ]
        );
        assert_eq!(controller.last_result(), Some(&result));
    }

    #[test]
    fn test_failing_strip_does_not_block_frame() {
        let sim = Sim::new();
        let mut platform = SimPlatform::new(&sim, 2, RMT).with_fault(fail_four_pixel_strips);
        let mut s1 = [0u8; 9];
        let mut s2 = [0u8; 9];
        let mut s3 = [0u8; 12];
        let mut s4 = [0u8; 9];
        let mut s5 = [0u8; 9];
        let mut controller = StripController::<_, _, 8, 2>::new(platform.pool());

        let mut ids = Vec::new();
        for (pin, pixels) in [&mut s1[..], &mut s2[..], &mut s3[..], &mut s4[..], &mut s5[..]]
            .into_iter()
            .enumerate()
        {
            ids.push(
                controller
                    .register_strip(OutputTarget::Pin(pin as u8), pixels, WS2812)
                    .unwrap(),
            );
        }

        let result = controller.show();
        assert_eq!(
            result.status(ids[2]),
            Some(StripStatus::Failed(TransmitError::Hardware))
        );
        for &id in ids.iter().filter(|&&id| id != ids[2]) {
            assert_eq!(result.status(id), Some(StripStatus::Success));
        }
        assert_eq!(result.failure_count(), 1);
        assert_eq!(result.elapsed(), Duration::from_millis(30));

        // Faulting strips are retried on the next frame
        let again = controller.show();
        assert_eq!(again.failure_count(), 1);
        assert_eq!(sim.log().len(), 10);
    }

    #[test]
    fn test_stuck_strip_times_out() {
        let sim = Sim::new();
        let mut platform = SimPlatform::new(&sim, 2, RMT).with_fault(hang_four_pixel_strips);
        let mut stuck = [0u8; 12];
        let mut healthy = [0u8; 9];
        let mut controller = StripController::<_, _, 4, 2>::with_config(
            platform.pool(),
            ControllerConfig {
                drain_timeout: Duration::from_millis(20),
            },
        );

        let stuck_id = controller
            .register_strip(OutputTarget::Pin(0), &mut stuck, WS2812)
            .unwrap();
        let healthy_id = controller
            .register_strip(OutputTarget::Pin(1), &mut healthy, WS2812)
            .unwrap();

        let result = controller.show();
        assert_eq!(result.status(stuck_id), Some(StripStatus::TimedOut));
        assert_eq!(result.status(healthy_id), Some(StripStatus::Success));
        assert_eq!(result.elapsed(), Duration::from_millis(20));
        assert_eq!(sim.resets(), 1);

        let shorter = controller.show_timeout_ms(5);
        assert_eq!(shorter.status(healthy_id), Some(StripStatus::TimedOut));
        assert_eq!(shorter.elapsed(), Duration::from_millis(5));
    }

    #[test]
    fn test_zero_length_strip_does_not_hold_channel() {
        let sim = Sim::new();
        let mut platform = SimPlatform::new(&sim, 1, RMT);
        let mut empty = [0u8; 0];
        let mut single = [0u8; 3];
        let mut controller = StripController::<_, _, 4, 1>::new(platform.pool());

        let empty_id = controller
            .register_strip(OutputTarget::Pin(0), &mut empty, WS2812)
            .unwrap();
        let single_id = controller
            .register_strip(OutputTarget::Pin(1), &mut single, WS2812)
            .unwrap();

        let result = controller.show();
        assert!(result.is_success());
        assert_eq!(result.report(empty_id).unwrap().channel, None);
        assert_eq!(result.report(single_id).unwrap().channel, Some(ChannelId(0)));
        assert_eq!(result.elapsed(), Duration::from_millis(10));
        assert_eq!(sim.log().len(), 1);
    }

    #[test]
    fn test_registration_errors_are_isolated() {
        let sim = Sim::new();
        let mut platform = SimPlatform::new(&sim, 1, RMT);
        let mut odd = [0u8; 4];
        let mut clocked = [0u8; 3];
        let mut first = [0u8; 3];
        let mut second = [0u8; 3];
        let mut third = [0u8; 3];
        let mut extra = [0u8; 3];
        let mut controller = StripController::<_, _, 2, 1>::new(platform.pool());

        assert_eq!(
            controller.register_strip(OutputTarget::Pin(0), &mut odd, WS2812),
            Err(ConfigurationError::InvalidLength {
                len: 4,
                components: 3
            })
        );
        assert_eq!(
            controller.register_strip(OutputTarget::Pin(0), &mut clocked, Chipset::Apa102.protocol()),
            Err(ConfigurationError::UnsupportedProtocol)
        );
        assert_eq!(
            controller.register_strip(
                OutputTarget::Lane { group: 0, lane: 0 },
                &mut first,
                WS2812
            ),
            Err(ConfigurationError::UnsupportedProtocol)
        );
        assert_eq!(controller.strip_count(), 0);

        let first_id = controller
            .register_strip(OutputTarget::Pin(0), &mut second, WS2812)
            .unwrap();
        controller
            .register_strip(OutputTarget::Pin(1), &mut third, WS2812)
            .unwrap();
        assert_eq!(
            controller.register_strip(OutputTarget::Pin(2), &mut extra, WS2812),
            Err(ConfigurationError::TooManyStrips)
        );
        assert_eq!(controller.strip_count(), 2);
        assert_eq!(controller.target(first_id), Some(OutputTarget::Pin(0)));
        assert!(controller.show().is_success());
    }

    #[test]
    fn test_lane_group_shares_one_transmission() {
        let sim = Sim::new();
        let mut platform = SimPlatform::new(&sim, 2, PARLIO);
        let mut lane0 = [0xFFu8; 3];
        let mut lane1 = [0u8; 6];
        let mut lane2 = [0u8; 3];
        let mut duplicate = [0u8; 3];
        let mut mismatched = [0u8; 3];
        let mut solo = [0u8; 3];
        let mut controller = StripController::<_, _, 8, 2>::new(platform.pool());

        let lane = |lane| OutputTarget::Lane { group: 1, lane };
        let a = controller.register_strip(lane(0), &mut lane0, WS2812).unwrap();
        let b = controller.register_strip(lane(1), &mut lane1, WS2812).unwrap();
        let c = controller.register_strip(lane(2), &mut lane2, WS2812).unwrap();
        let d = controller
            .register_strip(OutputTarget::Pin(5), &mut solo, WS2812)
            .unwrap();

        assert_eq!(
            controller.register_strip(lane(1), &mut duplicate, WS2812),
            Err(ConfigurationError::LaneInUse { group: 1, lane: 1 })
        );
        assert_eq!(
            controller.register_strip(lane(3), &mut mismatched, Chipset::Ws2811.protocol()),
            Err(ConfigurationError::IncompatibleLanes)
        );
        assert_eq!(controller.strip_count(), 4);

        let result = controller.show();
        assert!(result.is_success());
        assert_eq!(sim.log().len(), 2);

        let group_channel = result.report(a).unwrap().channel;
        assert_eq!(group_channel, Some(ChannelId(0)));
        assert_eq!(result.report(b).unwrap().channel, group_channel);
        assert_eq!(result.report(c).unwrap().channel, group_channel);
        assert_eq!(result.report(d).unwrap().channel, Some(ChannelId(1)));

        // Longest lane sets the length: 6 bytes, 8 bits, 3 slots per bit
        let log = sim.log();
        let group = &log[0].waveform;
        assert!(matches!(group, Waveform::Parallel { lanes: 3, .. }));
        assert_eq!(group.len(), 6 * 8 * 3);
    }

    #[test]
    fn test_register_lane_group_is_all_or_nothing() {
        let sim = Sim::new();
        let mut platform = SimPlatform::new(&sim, 1, PARLIO);
        let mut a = [0u8; 3];
        let mut b = [0u8; 3];
        let mut bad = [0u8; 4];
        let mut c = [0u8; 3];
        let mut d = [0u8; 3];
        let mut again = [0u8; 3];
        let mut controller = StripController::<_, _, 8, 1>::new(platform.pool());

        assert_eq!(
            controller.register_lane_group(0, [(&mut a[..], WS2812), (&mut bad[..], WS2812)]),
            Err(ConfigurationError::InvalidLength {
                len: 4,
                components: 3
            })
        );
        assert_eq!(controller.strip_count(), 0);

        let ids = controller
            .register_lane_group(0, [(&mut b[..], WS2812), (&mut c[..], WS2812), (&mut d[..], WS2812)])
            .unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(
            controller.target(ids[2]),
            Some(OutputTarget::Lane { group: 0, lane: 2 })
        );
        assert_eq!(
            controller.register_lane_group(0, [(&mut again[..], WS2812)]),
            Err(ConfigurationError::LaneInUse { group: 0, lane: 0 })
        );

        let result = controller.show();
        assert_eq!(result.success_count(), 3);
        assert_eq!(sim.log().len(), 1);
    }

    #[test]
    fn test_show_is_idempotent() {
        let sim = Sim::new();
        let mut platform = SimPlatform::new(&sim, 1, SPI);
        let mut pixels = [1u8, 2, 3, 4, 5, 6];
        let mut controller = StripController::<_, _, 2, 1>::new(platform.pool());
        controller
            .register_strip(OutputTarget::Pin(0), &mut pixels, Chipset::Apa102.protocol())
            .unwrap();

        controller.show();
        controller.show();

        let log = sim.log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].waveform, log[1].waveform);
    }

    #[test]
    fn test_pixels_are_written_between_frames() {
        let sim = Sim::new();
        let mut platform = SimPlatform::new(&sim, 1, RMT);
        let mut pixels = [0u8; 6];
        let mut controller = StripController::<_, _, 2, 1>::new(platform.pool());
        let id = controller
            .register_strip(OutputTarget::Pin(0), &mut pixels, WS2812)
            .unwrap();

        let written = controller.write_rgb(
            id,
            ColorOrder::Grb,
            [RGB8::new(1, 2, 3), RGB8::new(4, 5, 6), RGB8::new(7, 8, 9)],
        );
        assert_eq!(written, 2);
        assert_eq!(controller.pixels(id), Some(&[2, 1, 3, 5, 4, 6][..]));

        if let Some(pixels) = controller.pixels_mut(id) {
            pixels[5] = 0xFF;
        }
        let expected = [2, 1, 3, 5, 4, 0xFF];
        assert_eq!(
            controller.encode(id),
            Some(encode(&expected, &WS2812, RMT).unwrap())
        );

        controller.show();
        let plan = ClocklessPlan::new(&WS2812_TIMING, 40_000_000, 0x7FFF).unwrap();
        let log = sim.log();
        let Waveform::Pulses { symbols, .. } = &log[0].waveform else {
            panic!("expected pulses");
        };
        assert_eq!(decode_pulses(&plan, symbols), Some(expected.to_vec()));
    }
}
