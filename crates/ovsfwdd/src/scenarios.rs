//! End-to-end forwarder scenarios over a recording command runner.
//!
//! Each test composes the full endpoint, issues requests and closes,
//! and asserts the exact OVS and iproute2 command sequences plus the
//! reference-count invariants.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use ovsfwd_common::shell::ExecResult;
use ovsfwd_common::{FwdResult, RecordingRunner};

use crate::chain::Ctx;
use crate::config::{parse_l2_connections, Config};
use crate::elements::connect::Downstream;
use crate::elements::resourcepool::ResourcePool;
use crate::endpoint::Forwarder;
use crate::model::{
    Connection, KernelMechanism, Mechanism, Request, VlanMechanism, VxlanMechanism,
};
use crate::portinfo::{Side, VfConfig};
use crate::sriov::SriovProvider;

/// Downstream peer answering with a configured mechanism.
struct StubDownstream {
    mechanism: Mutex<Mechanism>,
    requests: AtomicUsize,
}

impl StubDownstream {
    fn new(mechanism: Mechanism) -> Arc<Self> {
        Arc::new(Self {
            mechanism: Mutex::new(mechanism),
            requests: AtomicUsize::new(0),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Downstream for StubDownstream {
    async fn request(&self, _ctx: &Ctx, request: &Request) -> FwdResult<Connection> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut conn = request.connection.clone();
        conn.mechanism = Some(self.mechanism.lock().unwrap().clone());
        Ok(conn)
    }

    async fn close(&self, _ctx: &Ctx, _conn: &Connection) -> FwdResult<()> {
        Ok(())
    }
}

const HOST_ADDRS: &str = r#"[{"ifname":"eth0","addr_info":[
    {"family":"inet","local":"10.0.0.1","prefixlen":24,"scope":"global"}
]}]"#;

fn recording_runner() -> Arc<RecordingRunner> {
    let runner = RecordingRunner::new();
    runner.add_rule("-json addr show", ExecResult::ok(HOST_ADDRS));
    Arc::new(runner)
}

/// Registers the ofport answer for one interface.
fn of_port(runner: &RecordingRunner, ifname: &str, port_no: i32) {
    runner.add_rule(
        format!("get interface \"{ifname}\" ofport"),
        ExecResult::ok(port_no.to_string()),
    );
}

async fn kernel_forwarder(
    runner: &Arc<RecordingRunner>,
    downstream: Arc<StubDownstream>,
    l2_yaml: Option<&str>,
) -> Forwarder {
    let mut config = Config::new("10.0.0.1".parse().unwrap());
    config.name = "forwarder-ovs-test".to_string();
    if let Some(yaml) = l2_yaml {
        config.l2_connections = parse_l2_connections(yaml).unwrap();
    }
    let forwarder = Forwarder::new_kernel_server(config, runner.clone(), downstream)
        .await
        .unwrap();
    runner.reset();
    forwarder
}

fn kernel_request(id: &str, service: &str, vlan_id: u16) -> Request {
    Request {
        connection: Connection {
            id: id.to_string(),
            network_service: service.to_string(),
            mechanism: Some(Mechanism::Kernel(KernelMechanism {
                vlan_id,
                ..Default::default()
            })),
            ..Default::default()
        },
        mechanism_preferences: Vec::new(),
    }
}

async fn assert_no_residue(forwarder: &Forwarder) {
    assert!(forwarder.parent_if.lock().await.ref_counts.is_empty());
    assert!(forwarder.vxlan_counts.lock().await.is_empty());
    assert_eq!(forwarder.active_connections(), 0);
}

#[tokio::test]
async fn local_untagged_cross_connect() {
    let runner = recording_runner();
    of_port(&runner, "tapsrc-conn1", 1);
    of_port(&runner, "tapdst-conn1", 2);
    let downstream = StubDownstream::new(Mechanism::Kernel(KernelMechanism::default()));
    let forwarder = kernel_forwarder(&runner, downstream, None).await;

    let mut request = kernel_request("conn1", "ns-local", 0);
    let ctx = Ctx::new();
    let conn = forwarder.request(&ctx, &mut request).await.unwrap();
    assert_eq!(conn.id, "conn1");

    let cmds = runner.commands();
    // one pair per side, both ends up, both host ends on the bridge
    assert!(cmds.iter().any(|c| {
        c.contains("link add \"contsrc-conn1\" mtu 16000 type veth peer name \"tapsrc-conn1\"")
    }));
    assert!(cmds.iter().any(|c| {
        c.contains("link add \"contdst-conn1\" mtu 16000 type veth peer name \"tapdst-conn1\"")
    }));
    assert!(cmds.iter().any(|c| c.contains("--may-exist add-port \"br-nsm\" \"tapsrc-conn1\"")));
    assert!(cmds.iter().any(|c| c.contains("--may-exist add-port \"br-nsm\" \"tapdst-conn1\"")));

    // flow-pair parity: one rule per direction
    let flows = runner.commands_matching("add-flow");
    assert_eq!(flows.len(), 2);
    assert!(flows[0].contains("\"priority=100,in_port=2,actions=output:1\""));
    assert!(flows[1].contains("\"priority=100,in_port=1,actions=output:2\""));
    assert_eq!(forwarder.active_connections(), 1);

    runner.reset();
    let ctx = Ctx::new();
    forwarder.close(&ctx, &conn).await.unwrap();

    let cmds = runner.commands();
    assert!(cmds.iter().any(|c| c.contains("del-flows -OOpenflow13 \"br-nsm\" \"in_port=2\"")));
    assert!(cmds.iter().any(|c| c.contains("del-flows -OOpenflow13 \"br-nsm\" \"in_port=1\"")));
    assert!(cmds.iter().any(|c| c.contains("del-port \"br-nsm\" \"tapsrc-conn1\"")));
    assert!(cmds.iter().any(|c| c.contains("del-port \"br-nsm\" \"tapdst-conn1\"")));
    assert!(cmds.iter().any(|c| c.contains("link del \"tapsrc-conn1\"")));
    assert!(cmds.iter().any(|c| c.contains("link del \"tapdst-conn1\"")));
    assert_no_residue(&forwarder).await;
}

#[tokio::test]
async fn local_vlan_tagged_cross_connect() {
    let runner = recording_runner();
    of_port(&runner, "tapsrc-conn2", 4);
    of_port(&runner, "tapdst-conn2", 5);
    let downstream = StubDownstream::new(Mechanism::Kernel(KernelMechanism {
        vlan_id: 100,
        ..Default::default()
    }));
    let forwarder = kernel_forwarder(&runner, downstream, None).await;

    let mut request = kernel_request("conn2", "ns-vlan", 0);
    let ctx = Ctx::new();
    let conn = forwarder.request(&ctx, &mut request).await.unwrap();

    let flows = runner.commands_matching("add-flow");
    assert_eq!(flows.len(), 2);
    assert!(flows[0]
        .contains("\"priority=100,in_port=5,dl_vlan=100,actions=strip_vlan,output:4\""));
    // 100 + 4096 encodes OFPVID_PRESENT in vlan_vid
    assert!(flows[1].contains(
        "\"priority=100,in_port=4,actions=push_vlan:0x8100,set_field:4196->vlan_vid,output:5\""
    ));

    runner.reset();
    let ctx = Ctx::new();
    forwarder.close(&ctx, &conn).await.unwrap();
    let cmds = runner.commands();
    assert!(cmds.iter().any(|c| c.contains("\"in_port=5,dl_vlan=100\"")));
    assert!(cmds.iter().any(|c| c.contains("\"in_port=4\"")));
    assert_no_residue(&forwarder).await;
}

#[tokio::test]
async fn vlan_service_connections_share_one_trunk() {
    let runner = recording_runner();
    of_port(&runner, "tapsrc-connA", 3);
    of_port(&runner, "tapsrc-connB", 6);
    of_port(&runner, "tapdst-connA", 7);
    let downstream = StubDownstream::new(Mechanism::Kernel(KernelMechanism {
        vlan_id: 100,
        ..Default::default()
    }));
    let forwarder = kernel_forwarder(&runner, downstream, None).await;

    let ctx = Ctx::new();
    let conn_a = forwarder
        .request(&ctx, &mut kernel_request("connA", "ns-trunk", 0))
        .await
        .unwrap();
    let ctx = Ctx::new();
    let conn_b = forwarder
        .request(&ctx, &mut kernel_request("connB", "ns-trunk", 0))
        .await
        .unwrap();

    // the second endpoint-facing attachment reuses the first trunk
    let veth_adds = runner.commands_matching("type veth");
    assert_eq!(veth_adds.len(), 3);
    assert!(!veth_adds.iter().any(|c| c.contains("tapdst-connB")));
    assert_eq!(
        forwarder.parent_if.lock().await.ref_counts.count("tapdst-connA"),
        2
    );

    runner.reset();
    let ctx = Ctx::new();
    forwarder.close(&ctx, &conn_a).await.unwrap();
    // the trunk still carries connB
    assert!(!runner.commands().iter().any(|c| c.contains("link del \"tapdst-connA\"")));

    let ctx = Ctx::new();
    forwarder.close(&ctx, &conn_b).await.unwrap();
    assert!(runner.commands().iter().any(|c| c.contains("link del \"tapdst-connA\"")));
    assert_no_residue(&forwarder).await;
}

#[tokio::test]
async fn remote_vxlan_cross_connect() {
    let runner = recording_runner();
    of_port(&runner, "tapsrc-conn3", 1);
    of_port(&runner, "v10002", 10);
    let downstream = StubDownstream::new(Mechanism::Vxlan(VxlanMechanism {
        src_ip: Some("10.0.0.1".parse().unwrap()),
        dst_ip: Some("10.0.0.2".parse().unwrap()),
        vni: 5000,
    }));
    let forwarder = kernel_forwarder(&runner, downstream, None).await;

    let mut request = kernel_request("conn3", "ns-remote", 0);
    let ctx = Ctx::new();
    let conn = forwarder.request(&ctx, &mut request).await.unwrap();

    let cmds = runner.commands();
    let tunnel_adds = runner.commands_matching("type=vxlan");
    assert_eq!(tunnel_adds.len(), 1);
    assert!(tunnel_adds[0].contains("add-port \"br-nsm\" \"v10002\""));
    assert!(tunnel_adds[0].contains("options:local_ip=10.0.0.1"));
    assert!(tunnel_adds[0].contains("options:remote_ip=10.0.0.2"));
    assert!(tunnel_adds[0].contains("options:key=flow"));
    assert!(!cmds.iter().any(|c| c.contains("tapdst-conn3")));

    let flows = runner.commands_matching("add-flow");
    assert_eq!(flows.len(), 2);
    assert!(flows[0]
        .contains("\"priority=100,in_port=1,actions=set_field:5000->tun_id,output:10\""));
    assert!(flows[1].contains("\"priority=100,in_port=10,tun_id=5000,actions=output:1\""));

    runner.reset();
    let ctx = Ctx::new();
    forwarder.close(&ctx, &conn).await.unwrap();
    let cmds = runner.commands();
    assert!(cmds.iter().any(|c| c.contains("\"in_port=1\"")));
    assert!(cmds.iter().any(|c| c.contains("\"in_port=10,tun_id=5000\"")));
    assert!(cmds.iter().any(|c| c.contains("del-port \"br-nsm\" \"v10002\"")));
    assert_no_residue(&forwarder).await;
}

#[tokio::test]
async fn inbound_vxlan_terminates_tunnel() {
    let runner = recording_runner();
    of_port(&runner, "v10005", 11);
    of_port(&runner, "tapdst-conn9", 2);
    let downstream = StubDownstream::new(Mechanism::Kernel(KernelMechanism::default()));
    let forwarder = kernel_forwarder(&runner, downstream, None).await;

    let mut request = Request {
        connection: Connection {
            id: "conn9".to_string(),
            network_service: "ns-inbound".to_string(),
            mechanism: Some(Mechanism::Vxlan(VxlanMechanism {
                src_ip: Some("10.0.0.5".parse().unwrap()),
                dst_ip: Some("10.0.0.1".parse().unwrap()),
                vni: 6000,
            })),
            ..Default::default()
        },
        mechanism_preferences: Vec::new(),
    };
    let ctx = Ctx::new();
    forwarder.request(&ctx, &mut request.clone()).await.unwrap();

    // the inbound side answers back toward the initiating forwarder
    let tunnel_adds = runner.commands_matching("type=vxlan");
    assert_eq!(tunnel_adds.len(), 1);
    assert!(tunnel_adds[0].contains("\"v10005\""));
    assert!(tunnel_adds[0].contains("options:local_ip=10.0.0.1"));
    assert!(tunnel_adds[0].contains("options:remote_ip=10.0.0.5"));

    // the tunnel port attaches after the outbound chain has run, so the
    // first request leaves the pair install to the refresh that follows
    assert!(runner.commands_matching("add-flow").is_empty());

    let ctx = Ctx::new();
    let conn = forwarder.request(&ctx, &mut request).await.unwrap();

    let flows = runner.commands_matching("add-flow");
    assert_eq!(flows.len(), 2);
    assert!(flows[0]
        .contains("\"priority=100,in_port=2,actions=set_field:6000->tun_id,output:11\""));
    assert!(flows[1].contains("\"priority=100,in_port=11,tun_id=6000,actions=output:2\""));

    let ctx = Ctx::new();
    forwarder.close(&ctx, &conn).await.unwrap();
    assert_no_residue(&forwarder).await;
}

#[tokio::test]
async fn vxlan_tunnel_ports_coalesce() {
    let runner = recording_runner();
    of_port(&runner, "tapsrc-conn4a", 1);
    of_port(&runner, "tapsrc-conn4b", 2);
    of_port(&runner, "v10002", 10);
    let downstream = StubDownstream::new(Mechanism::Vxlan(VxlanMechanism {
        src_ip: Some("10.0.0.1".parse().unwrap()),
        dst_ip: Some("10.0.0.2".parse().unwrap()),
        vni: 5000,
    }));
    let forwarder = kernel_forwarder(&runner, downstream.clone(), None).await;

    let ctx = Ctx::new();
    let conn_a = forwarder
        .request(&ctx, &mut kernel_request("conn4a", "ns-remote", 0))
        .await
        .unwrap();

    *downstream.mechanism.lock().unwrap() = Mechanism::Vxlan(VxlanMechanism {
        src_ip: Some("10.0.0.1".parse().unwrap()),
        dst_ip: Some("10.0.0.2".parse().unwrap()),
        vni: 5001,
    });
    let ctx = Ctx::new();
    let conn_b = forwarder
        .request(&ctx, &mut kernel_request("conn4b", "ns-remote", 0))
        .await
        .unwrap();

    // exactly one tunnel port serves both VNIs
    assert_eq!(runner.commands_matching("type=vxlan").len(), 1);
    assert_eq!(forwarder.vxlan_counts.lock().await.count("v10002"), 2);

    runner.reset();
    let ctx = Ctx::new();
    forwarder.close(&ctx, &conn_a).await.unwrap();
    assert!(!runner.commands().iter().any(|c| c.contains("del-port \"br-nsm\" \"v10002\"")));
    assert_eq!(forwarder.vxlan_counts.lock().await.count("v10002"), 1);

    let ctx = Ctx::new();
    forwarder.close(&ctx, &conn_b).await.unwrap();
    assert!(runner.commands().iter().any(|c| c.contains("del-port \"br-nsm\" \"v10002\"")));
    assert_no_residue(&forwarder).await;
}

#[tokio::test]
async fn vlan_breakout_moves_port_and_clamps_mtu() {
    let runner = recording_runner();
    runner.add_rule(
        "link show dev \"eth1\"",
        ExecResult::ok(r#"[{"ifname":"eth1","mtu":1400}]"#),
    );
    of_port(&runner, "tapsrc-conn5", 3);
    let downstream = StubDownstream::new(Mechanism::Vlan(VlanMechanism { vlan_id: 200 }));
    let forwarder = kernel_forwarder(
        &runner,
        downstream,
        Some("red:\n  interface: eth1\n  bridge: br-red\n"),
    )
    .await;

    let mut request = kernel_request("conn5", "ns-breakout", 0);
    request
        .connection
        .labels
        .insert("via".to_string(), "red".to_string());
    let ctx = Ctx::new();
    let conn = forwarder.request(&ctx, &mut request).await.unwrap();

    let cmds = runner.commands();
    let move_del = cmds
        .iter()
        .position(|c| c.contains("del-port \"br-nsm\" \"tapsrc-conn5\""))
        .expect("port leaves the main bridge");
    let move_add = cmds
        .iter()
        .position(|c| c.contains("--may-exist add-port \"br-red\" \"tapsrc-conn5\" tag=200"))
        .expect("port joins the egress bridge with its tag");
    assert!(move_del < move_add);

    // breakout bypasses pair-install
    assert!(runner.commands_matching("add-flow").is_empty());
    assert_eq!(conn.context.mtu, 1400);

    runner.reset();
    let ctx = Ctx::new();
    forwarder.close(&ctx, &conn).await.unwrap();
    let cmds = runner.commands();
    assert!(cmds.iter().any(|c| c.contains("del-port \"br-red\" \"tapsrc-conn5\"")));
    // the port was never on the main bridge at teardown time
    assert!(!cmds.iter().any(|c| c.contains("del-port \"br-nsm\" \"tapsrc-conn5\"")));
    assert!(cmds.iter().any(|c| c.contains("link del \"tapsrc-conn5\"")));
    assert_no_residue(&forwarder).await;
}

#[tokio::test]
async fn refresh_request_is_idempotent() {
    let runner = recording_runner();
    of_port(&runner, "tapsrc-conn6", 1);
    of_port(&runner, "tapdst-conn6", 2);
    let downstream = StubDownstream::new(Mechanism::Kernel(KernelMechanism::default()));
    let forwarder = kernel_forwarder(&runner, downstream.clone(), None).await;

    let ctx = Ctx::new();
    let conn = forwarder
        .request(&ctx, &mut kernel_request("conn6", "ns-local", 0))
        .await
        .unwrap();
    assert_eq!(downstream.request_count(), 1);

    runner.reset();
    let ctx = Ctx::new();
    forwarder
        .request(&ctx, &mut kernel_request("conn6", "ns-local", 0))
        .await
        .unwrap();

    // the refresh reaches the next hop but re-programs nothing
    assert_eq!(downstream.request_count(), 2);
    assert!(runner.commands().is_empty());
    assert_eq!(forwarder.parent_if.lock().await.ref_counts.count("tapsrc-conn6"), 1);

    runner.reset();
    let ctx = Ctx::new();
    forwarder.close(&ctx, &conn).await.unwrap();
    assert_eq!(runner.commands_matching("link del").len(), 2);
    assert_no_residue(&forwarder).await;
}

#[tokio::test]
async fn failed_flow_install_tears_everything_down() {
    let runner = recording_runner();
    of_port(&runner, "tapsrc-conn7", 1);
    of_port(&runner, "tapdst-conn7", 2);
    runner.add_rule("add-flow", ExecResult::failed(1, "syntax error"));
    let downstream = StubDownstream::new(Mechanism::Kernel(KernelMechanism::default()));
    let forwarder = kernel_forwarder(&runner, downstream, None).await;

    let mut request = kernel_request("conn7", "ns-local", 0);
    let ctx = Ctx::new();
    assert!(forwarder.request(&ctx, &mut request).await.is_err());

    // no host-visible artifact survives the failed request
    let cmds = runner.commands();
    assert!(cmds.iter().any(|c| c.contains("del-port \"br-nsm\" \"tapsrc-conn7\"")));
    assert!(cmds.iter().any(|c| c.contains("del-port \"br-nsm\" \"tapdst-conn7\"")));
    assert!(cmds.iter().any(|c| c.contains("link del \"tapsrc-conn7\"")));
    assert!(cmds.iter().any(|c| c.contains("link del \"tapdst-conn7\"")));
    assert_no_residue(&forwarder).await;
}

#[tokio::test]
async fn failed_downstream_rolls_back_client_port() {
    struct FailingDownstream;

    #[async_trait]
    impl Downstream for FailingDownstream {
        async fn request(&self, _ctx: &Ctx, _request: &Request) -> FwdResult<Connection> {
            Err(ovsfwd_common::FwdError::internal("peer unreachable"))
        }

        async fn close(&self, _ctx: &Ctx, _conn: &Connection) -> FwdResult<()> {
            Ok(())
        }
    }

    let runner = recording_runner();
    of_port(&runner, "tapsrc-conn8", 1);
    let mut config = Config::new("10.0.0.1".parse().unwrap());
    config.name = "forwarder-ovs-test".to_string();
    let forwarder =
        Forwarder::new_kernel_server(config, runner.clone(), Arc::new(FailingDownstream))
            .await
            .unwrap();
    runner.reset();

    let mut request = kernel_request("conn8", "ns-local", 0);
    let ctx = Ctx::new();
    assert!(forwarder.request(&ctx, &mut request).await.is_err());

    let cmds = runner.commands();
    assert!(cmds.iter().any(|c| c.contains("del-port \"br-nsm\" \"tapsrc-conn8\"")));
    assert!(cmds.iter().any(|c| c.contains("link del \"tapsrc-conn8\"")));
    assert_no_residue(&forwarder).await;
}

#[tokio::test]
async fn sriov_connection_attaches_representor() {
    struct StubPool;

    #[async_trait]
    impl ResourcePool for StubPool {
        async fn assign(&self, ctx: &Ctx, _conn: &Connection, side: Side) -> FwdResult<()> {
            ctx.metadata()?.side(side).store(VfConfig {
                vf_interface_name: "vfnet0".to_string(),
                pf_interface_name: "enp3s0f0".to_string(),
                vf_num: 1,
            });
            Ok(())
        }

        async fn release(&self, ctx: &Ctx, _conn: &Connection, side: Side) -> FwdResult<()> {
            ctx.metadata()?.side(side).delete::<VfConfig>();
            Ok(())
        }
    }

    struct StubSriov;

    impl SriovProvider for StubSriov {
        fn vf_representor(&self, pf: &str, vf_num: i32) -> FwdResult<String> {
            Ok(format!("{pf}_{vf_num}"))
        }
    }

    let runner = recording_runner();
    of_port(&runner, "enp3s0f0_1", 12);
    of_port(&runner, "tapdst-connvf", 2);
    let downstream = StubDownstream::new(Mechanism::Kernel(KernelMechanism::default()));
    let mut config = Config::new("10.0.0.1".parse().unwrap());
    config.name = "forwarder-ovs-test".to_string();
    let forwarder = Forwarder::new_sriov_server(
        config,
        runner.clone(),
        downstream,
        Arc::new(StubPool),
        Arc::new(StubSriov),
    )
    .await
    .unwrap();
    runner.reset();

    let mut request = kernel_request("connvf", "ns-sriov", 0);
    if let Some(Mechanism::Kernel(k)) = request.connection.mechanism.as_mut() {
        k.device_token_id = Some("token-1".to_string());
    }
    let ctx = Ctx::new();
    let conn = forwarder.request(&ctx, &mut request).await.unwrap();

    let cmds = runner.commands();
    assert!(cmds.iter().any(|c| c.contains("--may-exist add-port \"br-nsm\" \"enp3s0f0_1\"")));
    // the representor is attached as-is, no veth pair for this side
    assert!(!cmds.iter().any(|c| c.contains("tapsrc-connvf")));
    assert_eq!(runner.commands_matching("add-flow").len(), 2);

    runner.reset();
    let ctx = Ctx::new();
    forwarder.close(&ctx, &conn).await.unwrap();
    assert!(runner.commands().iter().any(|c| c.contains("del-port \"br-nsm\" \"enp3s0f0_1\"")));
    assert_no_residue(&forwarder).await;
}

#[tokio::test]
async fn interleaved_connections_leave_no_residue() {
    let runner = recording_runner();
    for i in 1..=4 {
        of_port(&runner, &format!("tapsrc-many{i}"), i);
        of_port(&runner, &format!("tapdst-many{i}"), 10 + i);
    }
    let downstream = StubDownstream::new(Mechanism::Kernel(KernelMechanism::default()));
    let forwarder = kernel_forwarder(&runner, downstream, None).await;

    let mut conns = Vec::new();
    for i in 1..=4 {
        let ctx = Ctx::new();
        let conn = forwarder
            .request(&ctx, &mut kernel_request(&format!("many{i}"), "ns-many", 0))
            .await
            .unwrap();
        conns.push(conn);
    }
    assert_eq!(forwarder.active_connections(), 4);

    // close in an order unrelated to creation
    for conn in [&conns[2], &conns[0], &conns[3], &conns[1]] {
        let ctx = Ctx::new();
        forwarder.close(&ctx, conn).await.unwrap();
    }
    assert_no_residue(&forwarder).await;
}
