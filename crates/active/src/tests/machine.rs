use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::machine::{
    Behavior, Context, MachineConfig, MachineError, StateMachine, StateMachineBuilder, StateName,
};
use crate::mailbox::PostError;
use crate::message::{Event, Message, ReplyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Light {
    Off,
    On,
}

impl StateName for Light {
    fn name(&self) -> &'static str {
        match self {
            Light::Off => "OFF",
            Light::On => "ON",
        }
    }
}

#[derive(Debug)]
enum Sig {
    Record(u32),
    Goto(Light),
    Kick,
    Continue,
    Gate {
        entered: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
    },
    Fence,
    Fail,
}

type Msg = Message<Sig, ()>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Seen {
    Entry(&'static str, Option<String>),
    Exit(&'static str),
    Record(u32),
    Kick,
    Continue,
}

#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Recorder {
    fn snapshot(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn push(&self, seen: Seen) {
        self.seen.lock().unwrap().push(seen);
    }
}

impl Behavior for Recorder {
    type State = Light;
    type Message = Msg;

    fn dispatch(&mut self, state: Light, event: Event<Msg>, ctx: &mut Context<Self>) {
        let mut message = match event {
            Event::Entry => {
                let thread = thread::current().name().map(str::to_owned);
                self.push(Seen::Entry(state.name(), thread));
                return;
            }
            Event::Exit => {
                self.push(Seen::Exit(state.name()));
                return;
            }
            Event::Message(message) => message,
        };

        match &message.signal {
            Sig::Record(value) => self.push(Seen::Record(*value)),
            Sig::Goto(target) => {
                let target = *target;
                self.set_state(ctx, target);
            }
            Sig::Kick => {
                self.push(Seen::Kick);
                ctx.post_self(Message::new(Sig::Continue)).unwrap();
            }
            Sig::Continue => self.push(Seen::Continue),
            Sig::Gate { entered, release } => {
                entered.send(()).unwrap();
                release.recv().unwrap();
            }
            Sig::Fence => {}
            Sig::Fail => panic!("handler failed"),
        }
        message.reply(());
    }
}

fn spawn(recorder: &Recorder, capacity: usize) -> StateMachine<Msg> {
    let config = MachineConfig::builder()
        .name("recorder")
        .queue_capacity(capacity)
        .build();
    StateMachine::spawn(config, Light::Off, recorder.clone()).expect("machine should start")
}

fn fence(machine: &StateMachine<Msg>) {
    let (message, waiter) = Message::call(Sig::Fence);
    machine.post(message).unwrap();
    waiter.wait().unwrap();
}

/// Blocks the executor inside a handler until the returned sender fires.
fn hold_executor(machine: &StateMachine<Msg>) -> mpsc::Sender<()> {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    machine
        .post(Message::new(Sig::Gate {
            entered: entered_tx,
            release: release_rx,
        }))
        .unwrap();
    entered_rx.recv().unwrap();
    release_tx
}

#[test]
fn initial_entry_runs_on_executor_before_spawn_returns() {
    let recorder = Recorder::default();
    let machine = spawn(&recorder, 10);

    assert_eq!(
        recorder.snapshot(),
        vec![Seen::Entry("OFF", Some("recorder".to_string()))]
    );
    assert_eq!(machine.state_name(), Some("OFF"));
    assert_eq!(machine.name(), "recorder");
}

#[test]
fn messages_are_delivered_in_post_order() {
    let recorder = Recorder::default();
    let machine = spawn(&recorder, 10);

    for value in 1..=5 {
        machine.post(Message::new(Sig::Record(value))).unwrap();
    }
    fence(&machine);

    let records: Vec<Seen> = recorder.snapshot().into_iter().skip(1).collect();
    assert_eq!(records, (1..=5).map(Seen::Record).collect::<Vec<_>>());
}

#[test]
fn transition_runs_exit_then_entry() {
    let recorder = Recorder::default();
    let machine = spawn(&recorder, 10);

    machine.post(Message::new(Sig::Goto(Light::On))).unwrap();
    fence(&machine);

    assert_eq!(
        recorder.snapshot(),
        vec![
            Seen::Entry("OFF", Some("recorder".to_string())),
            Seen::Exit("OFF"),
            Seen::Entry("ON", Some("recorder".to_string())),
        ]
    );
    assert_eq!(machine.state_name(), Some("ON"));
}

#[test]
fn reentering_current_state_is_a_no_op() {
    let recorder = Recorder::default();
    let machine = spawn(&recorder, 10);

    machine.post(Message::new(Sig::Goto(Light::Off))).unwrap();
    fence(&machine);

    assert_eq!(recorder.snapshot().len(), 1);
}

#[test]
fn self_posts_queue_behind_already_queued_messages() {
    let recorder = Recorder::default();
    let machine = spawn(&recorder, 10);

    let release = hold_executor(&machine);
    machine.post(Message::new(Sig::Kick)).unwrap();
    machine.post(Message::new(Sig::Record(7))).unwrap();
    release.send(()).unwrap();
    fence(&machine);

    let tail: Vec<Seen> = recorder.snapshot().into_iter().skip(1).collect();
    assert_eq!(tail, vec![Seen::Kick, Seen::Record(7), Seen::Continue]);
}

#[test]
fn full_queue_rejects_posts_without_blocking() {
    let recorder = Recorder::default();
    let machine = spawn(&recorder, 2);

    let release = hold_executor(&machine);
    assert!(machine.post(Message::new(Sig::Record(1))).is_ok());
    assert!(machine.post(Message::new(Sig::Record(2))).is_ok());
    assert_eq!(
        machine.post(Message::new(Sig::Record(3))),
        Err(PostError::QueueFull { machine: "recorder" })
    );

    release.send(()).unwrap();
    fence(&machine);
    let tail: Vec<Seen> = recorder.snapshot().into_iter().skip(1).collect();
    assert_eq!(tail, vec![Seen::Record(1), Seen::Record(2)]);
}

#[test]
fn rejected_call_wakes_its_waiter() {
    let recorder = Recorder::default();
    let machine = spawn(&recorder, 1);

    let release = hold_executor(&machine);
    machine.post(Message::new(Sig::Record(1))).unwrap();
    let (message, waiter) = Message::call(Sig::Fence);
    assert!(machine.post(message).is_err());
    assert!(waiter.wait().is_err());
    release.send(()).unwrap();
}

#[test]
fn transition_hook_sees_every_transition() {
    let recorder = Recorder::default();
    let transitions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&transitions);

    let machine = StateMachineBuilder::new(MachineConfig::builder().name("hooked").build())
        .with_transition_hook(Arc::new(move |from, to| {
            sink.lock().unwrap().push((from, to));
        }))
        .spawn(Light::Off, recorder.clone())
        .unwrap();

    machine.post(Message::new(Sig::Goto(Light::On))).unwrap();
    machine.post(Message::new(Sig::Goto(Light::On))).unwrap();
    machine.post(Message::new(Sig::Goto(Light::Off))).unwrap();
    fence(&machine);

    assert_eq!(
        transitions.lock().unwrap().as_slice(),
        &[("OFF", "ON"), ("ON", "OFF")]
    );
}

#[test]
fn zero_capacity_is_rejected() {
    let config = MachineConfig::builder().name("empty").queue_capacity(0).build();
    let result = StateMachine::spawn(config, Light::Off, Recorder::default());
    assert!(matches!(result, Err(MachineError::InvalidConfig(_))));
}

#[test]
fn independent_machines_coexist() {
    let first = Recorder::default();
    let second = Recorder::default();
    let a = spawn(&first, 4);
    let b = spawn(&second, 4);

    a.post(Message::new(Sig::Record(1))).unwrap();
    b.post(Message::new(Sig::Goto(Light::On))).unwrap();
    fence(&a);
    fence(&b);

    assert_eq!(a.state_name(), Some("OFF"));
    assert_eq!(b.state_name(), Some("ON"));
    assert_eq!(first.snapshot().len(), 2);
}

#[test]
fn panicking_handler_closes_the_queue() {
    let recorder = Recorder::default();
    let machine = spawn(&recorder, 4);

    let release = hold_executor(&machine);
    machine.post(Message::new(Sig::Fail)).unwrap();
    let (message, stranded) = Message::call(Sig::Fence);
    machine.post(message).unwrap();
    release.send(()).unwrap();

    assert_eq!(stranded.wait(), Err(ReplyError::Dropped));
    assert_eq!(
        machine.post(Message::new(Sig::Record(1))),
        Err(PostError::Closed { machine: "recorder" })
    );
    assert_eq!(recorder.snapshot().len(), 1);
}
