//! Purpose: Hold top-level CLI command dispatch for `rapor`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every network command goes through one `Dispatcher` built from `ClientArgs`.

use super::*;

pub(super) fn dispatch_command(command: Command, client: &ClientArgs) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "rapor", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Call {
            action,
            params,
            json_params,
        } => {
            if action.is_empty() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("action must not be empty")
                    .with_hint("Use `rapor call <action>`, e.g. `rapor call getKelas`."));
            }
            let mut merged = parse_string_pairs(&params, "--param")?;
            merged.extend(&parse_json_pairs(&json_params, "--json-param")?);
            let dispatcher = client.dispatcher()?;
            Ok(finish(dispatcher.dispatch(&action, &merged)))
        }
        Command::Login { username, password } => {
            let dispatcher = client.dispatcher()?;
            Ok(finish(dispatcher.entities().login(&username, &password)))
        }
        Command::Kelas { op } => run_entity(Entity::Kelas, op, client),
        Command::Siswa { op } => run_entity(Entity::Siswa, op, client),
        Command::Tugas { op } => run_entity(Entity::Tugas, op, client),
        Command::Nilai { op } => run_entity(Entity::Nilai, op, client),
        Command::ClassOptions => {
            let dispatcher = client.dispatcher()?;
            emit_json(Value::Array(dispatcher.entities().class_options()));
            Ok(RunOutcome::ok())
        }
    }
}

fn run_entity(entity: Entity, op: EntityOp, client: &ClientArgs) -> Result<RunOutcome, Error> {
    let dispatcher = client.dispatcher()?;
    let api = dispatcher.entities();
    let response = match op {
        EntityOp::List { relations } => {
            if relations.is_empty() {
                api.list(entity)
            } else {
                api.find(entity, &parse_lookup(entity, &relations)?)
            }
        }
        EntityOp::Get { id } => api.get_by_id(entity, id),
        EntityOp::Create { data } => api.create(entity, &parse_data(&data)?),
        EntityOp::Update { id, data } => api.update(entity, id, &parse_data(&data)?),
        EntityOp::Delete { id } => api.delete(entity, id),
        EntityOp::Page {
            page,
            page_size,
            filters,
        } => api.paginated(entity, &page_request(page, page_size, &filters)?),
    };
    Ok(finish(response))
}
