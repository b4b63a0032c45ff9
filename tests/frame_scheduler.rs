mod common;

mod tests {
    use myrtio_strip_mux::{
        Chipset, Duration, FrameScheduler, Instant, OutputTarget, StripController,
    };

    use crate::common::{RMT, Sim, SimPlatform};

    #[test]
    fn test_frame_scheduler_paces_frames() {
        let sim = Sim::new();
        let mut platform = SimPlatform::new(&sim, 1, RMT);
        let mut pixels = [0u8; 3];
        let mut controller = StripController::<_, _, 2, 1>::new(platform.pool());
        controller
            .register_strip(OutputTarget::Pin(0), &mut pixels, Chipset::Ws2812.protocol())
            .unwrap();
        let mut scheduler =
            FrameScheduler::with_frame_duration(controller, Duration::from_millis(16));

        let tick = scheduler.tick(Instant::from_millis(0));
        assert!(tick.result.is_success());
        assert_eq!(tick.next_deadline, Instant::from_millis(16));
        assert_eq!(tick.sleep_duration, Duration::from_millis(16));

        let tick = scheduler.tick(Instant::from_millis(16));
        assert_eq!(tick.next_deadline, Instant::from_millis(32));

        // Slightly late: keep the cadence
        let tick = scheduler.tick(Instant::from_millis(40));
        assert_eq!(tick.next_deadline, Instant::from_millis(48));
        assert_eq!(tick.sleep_duration, Duration::from_millis(8));

        // Long stall: drop the backlog
        let tick = scheduler.tick(Instant::from_millis(200));
        assert_eq!(tick.next_deadline, Instant::from_millis(216));
        assert_eq!(tick.sleep_duration, Duration::from_millis(16));

        // Behind schedule within the drift window: no sleep
        let tick = scheduler.tick(Instant::from_millis(240));
        assert_eq!(tick.next_deadline, Instant::from_millis(232));
        assert_eq!(tick.sleep_duration, Duration::from_ticks(0));

        assert_eq!(sim.log().len(), 5);
        assert_eq!(scheduler.controller().strip_count(), 1);
    }
}
