// Copyright 2026 Ekklesia Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! `elections-service` configuration (spec §4.0, §6).

use clap::Parser;
use config::{builder::DefaultState, ConfigBuilder, ConfigError, Map, Source, Value};
use ekklesia_core::settings::{insert_command_line_option, DatabaseSettings, DeploymentMode, EkklesiaSettings};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct ElectionsSettings {
	pub bind_addr: String,
	pub database: DatabaseSettings,
	pub s2s_shared_secret: String,
	pub identity_verifier_base_url: String,
	pub identity_verifier_timeout_secs: u64,
	/// Salt mixed into the anonymisation hash (spec §4.3); rotation requires
	/// a restart, per the read-at-startup secret policy in spec §5.
	pub anonymisation_secret_salt: String,
	pub orphan_sweep_max_age_minutes: i64,
	pub scheduler_interval_secs: u64,
	#[serde(default)]
	pub deployment_mode: DeploymentMode,
}

impl EkklesiaSettings for ElectionsSettings {
	type CommandLineOptions = CliOptions;

	fn set_defaults(builder: ConfigBuilder<DefaultState>) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
		builder
			.set_default("bind_addr", "0.0.0.0:8081")?
			.set_default("database.host", "localhost")?
			.set_default("database.port", 5432)?
			.set_default("database.user", "ekklesia")?
			.set_default("database.password", "")?
			.set_default("database.name", "ekklesia")?
			.set_default("database.max_connections", 10)?
			.set_default("s2s_shared_secret", "")?
			.set_default("identity_verifier_base_url", "http://localhost:9000")?
			.set_default("identity_verifier_timeout_secs", 5)?
			.set_default("anonymisation_secret_salt", "")?
			.set_default("orphan_sweep_max_age_minutes", 60 * 24)?
			.set_default("scheduler_interval_secs", 30)?
			.set_default("deployment_mode", "production")
	}
}

#[derive(Debug, Parser, Clone)]
#[command(name = "elections-service")]
pub struct CliOptions {
	#[arg(long, env = "CONFIG_ROOT", default_value = "")]
	pub config_root: String,
	#[arg(long)]
	pub bind_addr: Option<String>,
	#[arg(long)]
	pub database_host: Option<String>,
	#[arg(long)]
	pub database_port: Option<String>,
	#[arg(long)]
	pub s2s_shared_secret: Option<String>,
	#[arg(long)]
	pub deployment_mode: Option<String>,
}

impl Source for CliOptions {
	fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
		Box::new(self.clone())
	}

	fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
		let mut map: HashMap<String, Value> = HashMap::new();
		insert_command_line_option(&mut map, "bind_addr", &self.bind_addr);
		insert_command_line_option(&mut map, "database.host", &self.database_host);
		insert_command_line_option(&mut map, "database.port", &self.database_port);
		insert_command_line_option(&mut map, "s2s_shared_secret", &self.s2s_shared_secret);
		insert_command_line_option(&mut map, "deployment_mode", &self.deployment_mode);
		Ok(map.into_iter().collect())
	}
}
