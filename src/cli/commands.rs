//! Command dispatch: resolve handles, call services, print results

use std::io;
use std::time::Duration;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::services::{CallerIdentity, RegistrationOutcome, TraversalLimits};
use crate::cli::args::{Cli, Commands, ConfigCommands, ContactArgs, LimitArgs, ProfileArgs};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{expand_path, global_config_path, Settings};
use crate::domain::{BankDetails, KycDocuments, NewMember, ProfileUpdate};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, see `downline --help`".to_string(),
        ));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Config { command } => execute_config(cli, command),
        _ => {
            let container = ServiceContainer::new(load_settings(cli)?)?;
            execute_ledger_command(&container, command)
        }
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(data) = &cli.data {
        settings.data_file = expand_path(data);
    }
    debug!("settings: {:?}", settings);
    Ok(settings)
}

fn execute_ledger_command(c: &ServiceContainer, command: &Commands) -> CliResult<()> {
    match command {
        Commands::Init { root, contact } => cmd_init(c, root.as_deref(), contact),
        Commands::Register {
            handle,
            sponsor_code,
            contact,
        } => cmd_register(c, handle, sponsor_code, contact),
        Commands::Show { handle } => cmd_show(c, handle),
        Commands::Withdraw { handle, amount } => {
            let remaining = c.directory.withdraw(handle, *amount)?;
            output::success(&format!("withdrew {amount} from {handle}, balance {remaining}"));
            Ok(())
        }
        Commands::Credit { handle, amount } => {
            let member = c.directory.by_handle(handle)?;
            let balance = c.directory.credit_wallet(member.id, *amount)?;
            output::success(&format!("credited {amount} to {handle}, balance {balance}"));
            Ok(())
        }
        Commands::Pay { handle } => {
            let member = c.directory.by_handle(handle)?;
            let payment = c.directory.pay_company(member.id)?;
            output::success(&format!(
                "{handle} paid {}, balance {}",
                payment.amount, payment.remaining_balance
            ));
            output::field("company total", &payment.company_total);
            Ok(())
        }
        Commands::Slots { handle } => {
            let member = c.directory.by_handle(handle)?;
            let slots = c.directory.free_slots(member.id)?;
            output::header(handle);
            output::field("granted", &slots.granted);
            output::field("open", &slots.open);
            Ok(())
        }
        Commands::Profile(args) => cmd_profile(c, args),
        Commands::Upline { handle } => cmd_upline(c, handle),
        Commands::Tree { handle } => {
            let member = c.directory.by_handle(handle)?;
            let tree = c.tree.downline_tree(member.id)?;
            output::info(&tree.to_termtree());
            Ok(())
        }
        Commands::Team { handle, limits } => {
            let member = c.directory.by_handle(handle)?;
            let size = c.tree.team_size(member.id, traversal_limits(limits))?;
            output::action("team size", &size);
            Ok(())
        }
        Commands::Direct { handle } => {
            let member = c.directory.by_handle(handle)?;
            for child in c.tree.direct_downline(member.id)? {
                output::info(&child);
            }
            Ok(())
        }
        Commands::Search {
            handle,
            query,
            limits,
        } => {
            let member = c.directory.by_handle(handle)?;
            let hits = c
                .tree
                .search_subtree(member.id, query, traversal_limits(limits))?;
            output::header(&format!("{} matches for {:?}", hits.len(), query));
            for hit in hits {
                output::detail(&format!("{} {}", hit, output::opt(&hit.mobile)));
            }
            Ok(())
        }
        Commands::Achievers => {
            let achievers = c.ledger.achievers()?;
            output::header(&format!("{} achievers", achievers.len()));
            for a in achievers {
                output::detail(&format!(
                    "{} L{} earnings {} rewards {} achieved {}",
                    a.handle,
                    a.level,
                    a.earnings,
                    output::list(&a.rewards),
                    a.achieved_date.format("%Y-%m-%d")
                ));
            }
            Ok(())
        }
        Commands::Company => {
            output::action("company earnings", &c.ledger.company_earnings()?);
            Ok(())
        }
        Commands::Members => {
            let members = c.ledger.members()?;
            output::header(&format!("{} members", members.len()));
            for m in members {
                output::detail(&format!(
                    "{} L{} {} wallet {} downlines {}",
                    m.summary(),
                    m.level,
                    m.status,
                    m.wallet_balance,
                    m.downlines.len()
                ));
            }
            Ok(())
        }
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}

fn new_member(handle: &str, contact: &ContactArgs) -> NewMember {
    NewMember {
        handle: handle.to_string(),
        name: contact.name.clone(),
        mobile: contact.mobile.clone(),
        email: contact.email.clone(),
    }
}

fn traversal_limits(args: &LimitArgs) -> TraversalLimits {
    TraversalLimits {
        max_depth: args.max_depth,
        max_nodes: args.max_nodes,
        timeout: args.timeout_ms.map(Duration::from_millis),
    }
}

#[instrument(skip(c, contact))]
fn cmd_init(c: &ServiceContainer, root: Option<&str>, contact: &ContactArgs) -> CliResult<()> {
    let ledger = c.ledger.init_company()?;
    output::success(&format!(
        "company ledger ready (total {})",
        ledger.total_earnings
    ));
    if let Some(handle) = root {
        let member = c.directory.create_root(new_member(handle, contact))?;
        output::action("root", &member.summary());
    }
    Ok(())
}

#[instrument(skip(c, contact))]
fn cmd_register(
    c: &ServiceContainer,
    handle: &str,
    sponsor_code: &str,
    contact: &ContactArgs,
) -> CliResult<()> {
    let outcome = c
        .onboarding
        .register(new_member(handle, contact), sponsor_code)?;
    print_registration(&outcome);
    Ok(())
}

fn print_registration(outcome: &RegistrationOutcome) {
    output::success(&format!(
        "registered {} with referral code {}",
        outcome.member.handle, outcome.member.referral_code
    ));
    if let Some(report) = &outcome.distribution {
        output::field(
            "distributed",
            &format!("{} to {} uplines", report.total, report.credited.len()),
        );
        if let Some(anomaly) = &report.anomaly {
            output::warning(anomaly);
        }
    }
    for promotion in &outcome.promotions {
        for step in &promotion.steps {
            output::action(
                "promoted",
                &format!(
                    "{} to level {} {}",
                    step.handle,
                    step.new_level,
                    output::list(&step.granted)
                ),
            );
        }
        for achiever in &promotion.achievers {
            output::action("achiever", &format!("{} at level {}", achiever.handle, achiever.level));
        }
        if let Some(anomaly) = &promotion.anomaly {
            output::warning(anomaly);
        }
    }
    for follow_up in &outcome.deferred {
        output::warning(&format!("deferred: {follow_up:?}"));
    }
}

fn cmd_show(c: &ServiceContainer, handle: &str) -> CliResult<()> {
    let dashboard = c.directory.dashboard(handle)?;
    if dashboard.is_achiever {
        output::header(&format!("{} (achiever)", dashboard.handle));
    } else {
        output::header(&dashboard.handle);
    }
    output::field("level", &dashboard.level);
    output::field("earnings", &dashboard.earnings);
    output::field("wallet", &dashboard.wallet_balance);
    output::field("downlines", &dashboard.downlines);
    output::field("referral code", output::opt(&dashboard.referral_code));
    output::field("rewards", &output::list(&dashboard.rewards));
    Ok(())
}

#[instrument(skip(c, args), fields(handle = %args.handle))]
fn cmd_profile(c: &ServiceContainer, args: &ProfileArgs) -> CliResult<()> {
    let target = c.directory.by_handle(&args.handle)?;
    let caller = match &args.caller {
        Some(handle) if handle != &args.handle => c.directory.by_handle(handle)?,
        _ => target.clone(),
    };
    let identity = CallerIdentity {
        member_id: caller.id,
        is_admin: caller.is_admin,
    };

    let bank_given = [
        &args.bank_name,
        &args.account_number,
        &args.ifsc_code,
        &args.account_holder_name,
        &args.upi_number,
    ]
    .iter()
    .any(|f| f.is_some());
    let bank = bank_given.then(|| BankDetails {
        bank_name: args.bank_name.clone().or(target.bank.bank_name.clone()),
        account_number: args
            .account_number
            .clone()
            .or(target.bank.account_number.clone()),
        ifsc_code: args.ifsc_code.clone().or(target.bank.ifsc_code.clone()),
        account_holder_name: args
            .account_holder_name
            .clone()
            .or(target.bank.account_holder_name.clone()),
        upi_number: args.upi_number.clone().or(target.bank.upi_number.clone()),
    });

    let kyc_given = [&args.aadhar_front, &args.aadhar_back, &args.pancard]
        .iter()
        .any(|f| f.is_some());
    let kyc = kyc_given.then(|| KycDocuments {
        aadhar_front: args.aadhar_front.clone().or(target.kyc.aadhar_front.clone()),
        aadhar_back: args.aadhar_back.clone().or(target.kyc.aadhar_back.clone()),
        pancard: args.pancard.clone().or(target.kyc.pancard.clone()),
    });

    let update = ProfileUpdate {
        name: args.contact.name.clone(),
        mobile: args.contact.mobile.clone(),
        email: args.contact.email.clone(),
        address: args.address.clone(),
        bank,
        kyc,
    };
    if update == ProfileUpdate::default() {
        return Err(CliError::InvalidArgs("nothing to update".to_string()));
    }

    let member = c.directory.update_profile(&identity, target.id, update)?;
    output::success(&format!("profile of {} updated", member.handle));
    Ok(())
}

fn cmd_upline(c: &ServiceContainer, handle: &str) -> CliResult<()> {
    let member = c.directory.by_handle(handle)?;
    let chain = c.tree.upline(member.id)?;
    output::header(&format!("upline of {} ({} members)", handle, chain.len()));
    for (hop, entry) in chain.iter().enumerate() {
        output::detail(&format!(
            "{hop:>2} {} L{} {} {} {}",
            entry.handle,
            entry.level,
            output::opt(&entry.name),
            output::opt(&entry.email),
            output::opt(&entry.mobile)
        ));
    }
    Ok(())
}

fn execute_config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            let settings = load_settings(cli)?;
            match global_config_path() {
                Some(path) => output::field("global config", &path.display()),
                None => output::field("global config", "-"),
            }
            if let Some(local) = &cli.config {
                output::field("local config", &local.display());
            }
            output::field("data file", &settings.data_file.display());
        }
        ConfigCommands::Init { force } => {
            let path = global_config_path().ok_or_else(|| {
                CliError::Infra(InfraError::Config {
                    message: "cannot determine config directory".to_string(),
                })
            })?;
            if path.exists() && !force {
                return Err(CliError::Usage(format!(
                    "{} exists, use --force to overwrite",
                    path.display()
                )));
            }
            let write = path
                .parent()
                .map_or(Ok(()), std::fs::create_dir_all)
                .and_then(|_| std::fs::write(&path, Settings::template()));
            write.map_err(|e| {
                CliError::Infra(InfraError::Config {
                    message: format!("write {}: {}", path.display(), e),
                })
            })?;
            output::success(&format!("created {}", path.display()));
        }
    }
    Ok(())
}
