// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::{
    bail,
    Result,
};
use ::clap::{
    Arg,
    ArgMatches,
    Command,
};
use ::cosched::{
    runtime::logging,
    Config,
    SchedulingPolicy,
    SharedCondition,
    SharedKernel,
    SharedLock,
};
use ::std::{
    cell::RefCell,
    rc::Rc,
    str::FromStr,
};

//======================================================================================================================
// Program Arguments
//======================================================================================================================

/// Program Arguments
#[derive(Debug)]
pub struct ProgramArguments {
    /// Path to a configuration file.
    config_path: Option<String>,
    /// Dispatch policy, used when no configuration file is given.
    policy: SchedulingPolicy,
    /// Number of rounds that each player runs.
    nrounds: usize,
}

/// Associate functions for Program Arguments
impl ProgramArguments {
    /// Default number of rounds.
    const DEFAULT_NROUNDS: usize = 16;

    /// Parses the program arguments from the command line interface.
    pub fn new(app_name: &'static str, app_author: &'static str, app_about: &'static str) -> Result<Self> {
        let matches: ArgMatches = Command::new(app_name)
            .author(app_author)
            .about(app_about)
            .arg(
                Arg::new("config")
                    .long("config")
                    .value_parser(clap::value_parser!(String))
                    .required(false)
                    .value_name("PATH")
                    .conflicts_with("policy")
                    .help("Sets configuration file"),
            )
            .arg(
                Arg::new("policy")
                    .long("policy")
                    .value_parser(clap::value_parser!(String))
                    .required(false)
                    .value_name("priority|lottery")
                    .help("Sets dispatch policy"),
            )
            .arg(
                Arg::new("rounds")
                    .long("rounds")
                    .value_parser(clap::value_parser!(String))
                    .required(false)
                    .value_name("NUMBER")
                    .help("Sets number of rounds"),
            )
            .get_matches();

        // Default arguments.
        let mut args: ProgramArguments = ProgramArguments {
            config_path: None,
            policy: SchedulingPolicy::default(),
            nrounds: Self::DEFAULT_NROUNDS,
        };

        if let Some(config_path) = matches.get_one::<String>("config") {
            args.config_path = Some(config_path.to_string());
        }

        if let Some(policy) = matches.get_one::<String>("policy") {
            args.set_policy(policy)?;
        }

        if let Some(nrounds) = matches.get_one::<String>("rounds") {
            args.set_nrounds(nrounds)?;
        }

        Ok(args)
    }

    /// Builds the kernel configuration described by the target program arguments.
    pub fn get_config(&self) -> Result<Config> {
        let config: Config = match &self.config_path {
            Some(path) => Config::new(path)?,
            None => Config::from_yaml_str(&format!("scheduler:\n  scheduling_policy: {}\n", self.policy))?,
        };
        Ok(config)
    }

    pub fn get_nrounds(&self) -> usize {
        self.nrounds
    }

    fn set_policy(&mut self, policy_str: &str) -> Result<()> {
        self.policy = SchedulingPolicy::from_str(policy_str)?;
        Ok(())
    }

    fn set_nrounds(&mut self, nrounds_str: &str) -> Result<()> {
        let nrounds: usize = nrounds_str.parse()?;
        if nrounds > 0 {
            self.nrounds = nrounds;
            Ok(())
        } else {
            bail!("invalid number of rounds")
        }
    }
}

//======================================================================================================================
// Application
//======================================================================================================================

/// Two threads that hand a ball back and forth through a condition variable.
struct Application {
    kernel: SharedKernel,
    lock: SharedLock,
    condition: SharedCondition,
    /// Index of the player that holds the ball.
    turn: Rc<RefCell<usize>>,
    nrounds: usize,
}

impl Application {
    fn new(kernel: SharedKernel, args: &ProgramArguments) -> Self {
        let lock: SharedLock = SharedLock::new(kernel.clone());
        let condition: SharedCondition = SharedCondition::new(kernel.clone(), lock.clone());
        Self {
            kernel,
            lock,
            condition,
            turn: Rc::new(RefCell::new(0)),
            nrounds: args.get_nrounds(),
        }
    }

    fn spawn_player(&mut self, me: usize, name: &'static str) {
        let mut lock: SharedLock = self.lock.clone();
        let mut condition: SharedCondition = self.condition.clone();
        let turn: Rc<RefCell<usize>> = self.turn.clone();
        let kernel: SharedKernel = self.kernel.clone();
        let nrounds: usize = self.nrounds;
        self.kernel.spawn(name, async move {
            lock.acquire().await;
            for i in 0..nrounds {
                while *turn.borrow() != me {
                    condition.sleep().await;
                }
                println!("{} {:?} (now={:?})", name, i, kernel.now());
                *turn.borrow_mut() = 1 - me;
                condition.wake();
            }
            lock.release();
        });
    }

    fn run(&mut self) -> Result<()> {
        self.spawn_player(0, "ping");
        self.spawn_player(1, "pong");
        self.kernel.run()?;
        println!(
            "done: policy={}, rounds={:?}, ticks={:?}",
            self.kernel.policy(),
            self.nrounds,
            self.kernel.now()
        );
        Ok(())
    }
}

//======================================================================================================================
// main()
//======================================================================================================================

fn main() -> Result<()> {
    logging::initialize();

    let args: ProgramArguments = ProgramArguments::new(
        "condition-pingpong",
        "Microsoft Corporation",
        "Alternates two threads through a condition variable.",
    )?;

    let kernel: SharedKernel = match SharedKernel::new(&args.get_config()?) {
        Ok(kernel) => kernel,
        Err(e) => bail!("failed to initialize kernel: {:?}", e.cause),
    };

    let mut app: Application = Application::new(kernel, &args);
    app.run()
}
