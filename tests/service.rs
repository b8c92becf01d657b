use cncstream::communication::{LoopbackAcceptor, LoopbackConnector};
use cncstream::settings::{
    NetworkSettings, ServerSettings, StatusServerSettings, UploadServerSettings,
};
use cncstream::{tick, Config, Dispatcher, MachineControl, SimulatedMachine};
use std::collections::HashMap;

fn request(target: &str, body: &str) -> String {
    format!(
        "POST {} HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
        target,
        body.len(),
        body
    )
}

fn ticks(dispatcher: &mut Dispatcher<LoopbackAcceptor>, machine: &mut SimulatedMachine, n: usize) {
    for _ in 0..n {
        tick(dispatcher, machine);
    }
}

#[test]
fn test_service_from_saved_config() {
    let dir = tempfile::tempdir().unwrap();
    let upload_root = dir.path().join("sd");

    let mut config = Config::new();
    config.network = NetworkSettings {
        http_batch_server: Some(ServerSettings { port: 81 }),
        http_status_server: Some(StatusServerSettings {
            port: 84,
            report_period_ms: 0,
        }),
        http_sd_upload_server: Some(UploadServerSettings {
            port: 85,
            root: upload_root.clone(),
            quota_bytes: None,
        }),
        ..Default::default()
    };
    let path = dir.path().join("config.toml");
    config.save_to_file(&path).unwrap();
    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);

    let mut connectors: HashMap<String, LoopbackConnector> = HashMap::new();
    let mut dispatcher = Dispatcher::from_settings(&loaded.network, |name, _| {
        let acceptor = LoopbackAcceptor::new();
        connectors.insert(name.to_string(), acceptor.connector());
        acceptor
    });
    assert_eq!(dispatcher.init(), 3);
    let mut machine = SimulatedMachine::new();

    let upload = connectors["http_sd_upload_server"].connect().unwrap();
    upload.send(request("/jobs/part.nc", "G0 X3\nG0 Y4\n"));
    ticks(&mut dispatcher, &mut machine, 20);
    assert_eq!(
        std::fs::read_to_string(upload_root.join("jobs").join("part.nc")).unwrap(),
        "G0 X3\nG0 Y4\n"
    );
    assert!(upload.received_string().starts_with("HTTP/1.1 200 OK"));
    assert!(upload.is_shut_down());

    let batch = connectors["http_batch_server"].connect().unwrap();
    batch.send(request("/", "G1 X3 F100\nM3 S9000\n"));
    ticks(&mut dispatcher, &mut machine, 20);
    assert_eq!(machine.lines_executed(), 2);
    assert_eq!(machine.status_snapshot().signed_spindle_speed(), Some(9000.0));

    let status = connectors["http_status_server"].connect().unwrap();
    ticks(&mut dispatcher, &mut machine, 5);
    let received = status.received_string();
    assert!(received.contains("\"machine_position\":[3.0,0.0,0.0]"), "{}", received);
    assert!(received.contains("\"speed\":9000.0"), "{}", received);

    dispatcher.stop();
    assert_eq!(dispatcher.active_connections(), 0);
}
