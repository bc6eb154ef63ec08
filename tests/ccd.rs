use claims::{assert_ok, assert_ok_eq};
use mockall::Sequence;
use sbig_ccd::{
    camera_name,
    cfw::{self, CfwCommand, CfwError},
    establish_link, Ccd, Channel, Command, Error, ExposureState, InfoResults, ReadoutMode,
    Response, ShutterMode, StartExposureParams, EXP_LIGHT_CLEAR, EXP_MS_EXPOSURE, START_SKIP_VDD,
};
use std::time::Duration;
use utilities::{line_sample, MockLink, SimCamera};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn start_exposure_params(commands: &[Command]) -> Option<StartExposureParams> {
    commands.iter().find_map(|command| match command {
        Command::StartExposure(params) => Some(*params),
        _ => None,
    })
}

fn goto_positions(commands: &[Command]) -> Vec<u32> {
    commands
        .iter()
        .filter_map(|command| match command {
            Command::FilterWheel(params) if params.command == CfwCommand::Goto => {
                Some(params.param1)
            }
            _ => None,
        })
        .collect()
}

#[test]
fn creation_defaults_to_first_mode_full_frame() {
    init_logs();
    let ccd = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    assert_eq!(ccd.window(), (0, 0, 1020, 1530));
    assert_eq!(ccd.data().len(), 1020 * 1530);
    assert_eq!(ccd.readout_mode(), ReadoutMode::BIN_1X1);
    assert_eq!(camera_name(ccd.info().camera_type), "ST-8");
}

#[test]
fn creation_fails_when_an_info_query_fails() {
    let info = SimCamera::st8().info;
    let mut link = MockLink::new();
    let mut seq = Sequence::new();
    link.expect_invoke()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| Ok(Response::Info(InfoResults::Standard(info.clone()))));
    link.expect_invoke()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(Error::Device(6)));

    let err = Ccd::new(link, Channel::Imaging).unwrap_err();
    assert!(matches!(err, Error::Device(6)));
}

#[test]
fn establish_link_reports_the_camera_type() {
    let mut sim = SimCamera::st237();
    assert_ok_eq!(establish_link(&mut sim), 8);
    assert_eq!(camera_name(8), "ST-237");
}

#[test]
fn unsupported_readout_mode_is_rejected() {
    let mut ccd = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    let err = ccd.set_readout_mode(ReadoutMode(7)).unwrap_err();
    assert!(matches!(err, Error::InvalidMode));
    // failed selection leaves the geometry untouched
    assert_eq!(ccd.window(), (0, 0, 1020, 1530));
}

#[test]
fn vertical_binning_derives_height_from_the_unbinned_maximum() {
    let mut ccd = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    assert_ok!(ccd.set_readout_mode(ReadoutMode::nx1(4)));
    assert_eq!(ccd.window(), (0, 0, 255, 1530));
    assert_eq!(ccd.data().len(), 255 * 1530);

    let err = ccd.set_readout_mode(ReadoutMode::nx1(0)).unwrap_err();
    assert!(matches!(err, Error::InvalidMode));
}

#[test]
fn readout_fills_rows_top_to_bottom() {
    init_logs();
    let mut ccd = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    ccd.set_readout_mode(ReadoutMode::BIN_3X3).unwrap();
    assert_ok!(ccd.readout());

    let (_, _, height, width) = ccd.window();
    assert_eq!((height, width), (340, 510));
    for row in [0usize, 1, 170, 339] {
        for column in [0usize, 1, 509] {
            assert_eq!(
                ccd.data()[row * 510 + column],
                line_sample(row, column),
                "row {row} column {column}"
            );
        }
    }

    let commands = &ccd.link_mut().commands;
    let lines = commands
        .iter()
        .filter(|command| matches!(command, Command::ReadLine(_)))
        .count();
    assert_eq!(lines, 340);
    assert!(matches!(commands.last(), Some(Command::EndReadout(_))));
}

#[test]
fn readout_subtract_uses_the_subtracting_line_command() {
    let mut ccd = Ccd::new(SimCamera::st237(), Channel::Imaging).unwrap();
    ccd.set_readout_mode(ReadoutMode::BIN_2X2).unwrap();
    assert_ok!(ccd.readout_subtract());
    let lines = ccd
        .link_mut()
        .commands
        .iter()
        .filter(|command| matches!(command, Command::ReadSubtractLine(_)))
        .count();
    assert_eq!(lines, 240);
}

#[test]
fn failed_row_aborts_readout_without_end_readout() {
    let mut ccd = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    ccd.set_window(0, 0, 16, 16).unwrap();
    ccd.link_mut().fail_line_at = Some(5);

    let err = ccd.readout().unwrap_err();
    assert!(matches!(err, Error::Device(8)));

    // rows before the failure arrived, later rows stay untouched
    assert_eq!(ccd.data()[4 * 16], line_sample(4, 0));
    assert!(ccd.data()[5 * 16..].iter().all(|&sample| sample == 0));
    assert!(!ccd
        .link_mut()
        .commands
        .iter()
        .any(|command| matches!(command, Command::EndReadout(_))));
}

#[test]
fn window_is_bounded_by_the_current_window() {
    let mut ccd = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    assert_ok!(ccd.set_window(0, 0, 100, 100));
    // The bound follows the previous selection, not the sensor
    // maximum, so a shrunken window cannot be grown back directly.
    let err = ccd.set_window(0, 0, 200, 200).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter));
    assert_eq!(ccd.window(), (0, 0, 100, 100));

    assert_ok!(ccd.set_readout_mode(ReadoutMode::BIN_1X1));
    assert_ok!(ccd.set_window(0, 0, 200, 200));
}

#[test]
fn geometry_change_replaces_buffer_contents() {
    let mut ccd = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    ccd.set_window(0, 0, 8, 8).unwrap();
    ccd.readout().unwrap();
    assert!(ccd.data().iter().any(|&sample| sample != 0));

    ccd.set_window(0, 0, 4, 4).unwrap();
    assert_eq!(ccd.data().len(), 16);
    assert!(ccd.data().iter().all(|&sample| sample == 0));
}

#[test]
fn partial_frame_centers_the_window() {
    let mut ccd = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    assert_ok!(ccd.set_partial_frame(0.25));
    assert_eq!(ccd.window(), (255, 382, 510, 765));
    assert_eq!(ccd.data().len(), 510 * 765);
}

#[test]
fn partial_frame_aligns_bayer_sensors_to_even_offsets() {
    let mut ccd = Ccd::new(SimCamera::st402_bayer(), Channel::Imaging).unwrap();
    assert_ok!(ccd.set_partial_frame(0.25));
    assert_eq!(ccd.window(), (128, 192, 255, 382));
}

#[test]
fn partial_frame_rejects_fractions_outside_unit_range() {
    let mut ccd = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    assert!(matches!(
        ccd.set_partial_frame(0.0).unwrap_err(),
        Error::InvalidParameter
    ));
    assert!(matches!(
        ccd.set_partial_frame(1.5).unwrap_err(),
        Error::InvalidParameter
    ));
}

#[test]
fn exposure_is_bounded_by_the_model_minimum_and_encoding_ceiling() {
    let mut ccd = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    assert!(matches!(
        ccd.start_exposure(0, Duration::from_millis(119)).unwrap_err(),
        Error::InvalidParameter
    ));
    assert_ok!(ccd.start_exposure(0, Duration::from_millis(120)));

    // 0x00FFFFFF centiseconds is the largest encodable duration
    assert!(matches!(
        ccd.start_exposure(0, Duration::from_secs(167_773)).unwrap_err(),
        Error::InvalidParameter
    ));
}

#[test]
fn short_exposures_with_eshutter_encode_in_milliseconds() {
    let mut ccd = Ccd::new(SimCamera::st8().with_eshutter(), Channel::Imaging).unwrap();
    assert!(ccd.has_electronic_shutter());

    assert_ok!(ccd.start_exposure(0, Duration::from_millis(5)));
    let params = start_exposure_params(&ccd.link_mut().commands).unwrap();
    assert_eq!(params.exposure_time, 5 | EXP_MS_EXPOSURE);

    ccd.link_mut().commands.clear();
    assert_ok!(ccd.start_exposure(0, Duration::from_millis(20)));
    let params = start_exposure_params(&ccd.link_mut().commands).unwrap();
    assert_eq!(params.exposure_time, 2);
}

#[test]
fn exposure_flags_accumulate_into_the_encoded_duration() {
    let mut ccd = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    assert_ok!(ccd.set_exposure_flags(EXP_LIGHT_CLEAR));
    assert_ok!(ccd.start_exposure(START_SKIP_VDD, Duration::from_secs(1)));

    let params = start_exposure_params(&ccd.link_mut().commands).unwrap();
    assert_eq!(params.exposure_time, 100 | EXP_LIGHT_CLEAR);
    // imaging channel code 0 OR-ed with the start flag
    assert_eq!(params.ccd, START_SKIP_VDD);

    // duration bits are reserved for the driver
    assert!(matches!(
        ccd.set_exposure_flags(EXP_MS_EXPOSURE).unwrap_err(),
        Error::InvalidParameter
    ));

    ccd.link_mut().commands.clear();
    assert_ok!(ccd.clear_exposure_flags(EXP_LIGHT_CLEAR));
    assert_ok!(ccd.start_exposure(0, Duration::from_secs(1)));
    let params = start_exposure_params(&ccd.link_mut().commands).unwrap();
    assert_eq!(params.exposure_time, 100);
}

#[test]
fn exposure_status_demultiplexes_the_packed_word() {
    let mut imaging = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    imaging.link_mut().status_word = 0b1001;
    assert_ok_eq!(imaging.exposure_status(), ExposureState::InProgress);

    let mut tracking = Ccd::new(SimCamera::st8(), Channel::Tracking).unwrap();
    tracking.link_mut().status_word = 0b1001;
    assert_ok_eq!(tracking.exposure_status(), ExposureState::Complete);

    imaging.link_mut().status_word = 0;
    assert_ok_eq!(imaging.exposure_status(), ExposureState::Idle);
}

#[test]
fn st237_wheel_substitutes_for_the_shutter() {
    init_logs();
    let mut ccd = Ccd::new(SimCamera::st237(), Channel::Imaging).unwrap();
    ccd.set_shutter_mode(ShutterMode::Close);
    assert_ok!(ccd.start_exposure(0, Duration::from_millis(150)));
    assert_eq!(goto_positions(&ccd.link_mut().commands), vec![2]);
    assert_eq!(ccd.link_mut().cfw_position, 2);

    assert_ok!(ccd.end_exposure(0));
    assert_eq!(goto_positions(&ccd.link_mut().commands), vec![2, 1]);
    assert_eq!(ccd.link_mut().cfw_position, 1);

    // the restore ran once; ending again must not move the wheel
    assert_ok!(ccd.end_exposure(0));
    assert_eq!(goto_positions(&ccd.link_mut().commands), vec![2, 1]);
}

#[test]
fn wheel_already_in_place_needs_no_restore() {
    let mut ccd = Ccd::new(SimCamera::st237(), Channel::Imaging).unwrap();
    // shutter open and wheel already on the open slot
    assert_ok!(ccd.start_exposure(0, Duration::from_millis(150)));
    assert_ok!(ccd.end_exposure(0));
    assert!(goto_positions(&ccd.link_mut().commands).is_empty());
}

#[test]
fn wheel_failure_aborts_before_the_exposure_command() {
    let mut sim = SimCamera::st237();
    sim.cfw_position = 2;
    sim.fail_cfw_goto = Some(CfwError::Busy);
    let mut ccd = Ccd::new(sim, Channel::Imaging).unwrap();

    let err = ccd.start_exposure(0, Duration::from_millis(150)).unwrap_err();
    assert!(matches!(err, Error::FilterWheel(CfwError::Busy)));
    assert!(start_exposure_params(&ccd.link_mut().commands).is_none());
}

#[test]
fn failed_wheel_restore_stays_pending_for_retry() {
    let mut sim = SimCamera::st237();
    sim.cfw_position = 2;
    let mut ccd = Ccd::new(sim, Channel::Imaging).unwrap();
    // open shutter wanted, wheel on the closed slot: repositioned + restore pending
    assert_ok!(ccd.start_exposure(0, Duration::from_millis(150)));
    assert_eq!(ccd.link_mut().cfw_position, 1);

    ccd.link_mut().fail_cfw_goto = Some(CfwError::MotorTimeout);
    let err = ccd.end_exposure(0).unwrap_err();
    assert!(matches!(err, Error::FilterWheel(CfwError::MotorTimeout)));
    assert!(!ccd
        .link_mut()
        .commands
        .iter()
        .any(|command| matches!(command, Command::EndExposure(_))));

    // the retry restores the recorded position and completes
    ccd.link_mut().fail_cfw_goto = None;
    assert_ok!(ccd.end_exposure(0));
    assert_eq!(ccd.link_mut().cfw_position, 2);
}

#[test]
fn exposure_session_is_recorded_for_reporting() {
    let mut ccd = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    assert!(ccd.exposure_start().is_none());
    assert_ok!(ccd.start_exposure(0, Duration::from_millis(1500)));
    assert_eq!(ccd.exposure_time(), Duration::from_millis(1500));
    assert!(ccd.exposure_start().is_some());
}

#[test]
fn max_value_scans_past_the_first_row() {
    let mut ccd = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    ccd.set_window(0, 0, 4, 4).unwrap();
    ccd.readout().unwrap();
    // samples grow with the row index, so the maximum is off row zero
    assert_eq!(ccd.max_value(), line_sample(3, 3));
}

#[test]
fn color_convert_requires_a_bayer_sensor() {
    let mut mono = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    assert!(matches!(
        mono.color_convert("monochrome").unwrap_err(),
        Error::InvalidParameter
    ));

    let mut bayer = Ccd::new(SimCamera::st402_bayer(), Channel::Imaging).unwrap();
    assert!(matches!(
        bayer.color_convert("rgb").unwrap_err(),
        Error::InvalidParameter
    ));
    assert!(matches!(
        bayer.color_convert("").unwrap_err(),
        Error::InvalidParameter
    ));
}

#[test]
fn color_convert_replaces_the_buffer_with_quad_means() {
    let mut ccd = Ccd::new(SimCamera::st402_bayer(), Channel::Imaging).unwrap();
    ccd.set_window(0, 0, 4, 4).unwrap();
    ccd.readout().unwrap();
    // method names match as a case-insensitive prefix
    assert_ok!(ccd.color_convert("MONO"));

    let quad = |row: usize, column: usize| -> u16 {
        let sum = u32::from(line_sample(row, column))
            + u32::from(line_sample(row, column + 1))
            + u32::from(line_sample(row + 1, column))
            + u32::from(line_sample(row + 1, column + 1));
        (sum / 4) as u16
    };
    assert_eq!(ccd.data()[0], quad(0, 0));
    assert_eq!(ccd.data()[1], quad(0, 0));
    assert_eq!(ccd.data()[2 * 4 + 2], quad(2, 2));
    assert_eq!(ccd.data().len(), 16);
}

#[test]
fn pgm_export_round_trips_samples_in_big_endian() {
    let mut ccd = Ccd::new(SimCamera::st8(), Channel::Imaging).unwrap();
    ccd.set_readout_mode(ReadoutMode::BIN_3X3).unwrap();
    ccd.start_exposure(0, Duration::from_millis(1500)).unwrap();
    ccd.end_exposure(0).unwrap();
    ccd.readout().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.pgm");
    assert_ok!(ccd.write_pgm(&path));

    let bytes = std::fs::read(&path).unwrap();
    let mut lines = Vec::new();
    let mut pos = 0;
    for _ in 0..4 {
        let newline = pos + bytes[pos..].iter().position(|&b| b == b'\n').unwrap();
        lines.push(String::from_utf8(bytes[pos..newline].to_vec()).unwrap());
        pos = newline + 1;
    }

    assert_eq!(lines[0], "P5 510 340 65535");
    assert_eq!(lines[1], "# SBIG ST-8");
    assert_eq!(lines[2], "# exposureTime 1.500 seconds");
    assert_eq!(lines[3], "# mode low (510 x 340) 2.30 e-/ADU 27.00 x 27.00 microns");

    let samples: Vec<u16> = bytes[pos..]
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    assert_eq!(samples, ccd.data());
}

#[test]
fn cfw_module_drives_the_wheel_directly() {
    let mut sim = SimCamera::st8();
    assert_ok!(cfw::init(&mut sim));
    assert_ok_eq!(cfw::query(&mut sim), (cfw::CfwStatus::Idle, 1));
    assert_ok!(cfw::goto_position(&mut sim, 5));
    assert_ok_eq!(cfw::query(&mut sim), (cfw::CfwStatus::Idle, 5));

    let info = cfw::get_info(&mut sim).unwrap();
    assert_eq!(info.firmware_version, 0x0110);
    assert_eq!(info.position_count, 5);
    assert_eq!(cfw::cfw_name(info.model), "CFW-5");
}
