/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

use clap::Parser;
use mercurius_ctl::cli::{Cli, Commands};
use std::path::PathBuf;

#[test]
fn test_serve_command_parsing() {
    let args = vec!["mercurius", "serve", "--foreground"];

    let cli = Cli::try_parse_from(args).expect("Should parse serve command");

    match cli.command {
        Commands::Serve { foreground } => assert!(foreground),
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn test_send_msg_command_parsing() {
    let args = vec![
        "mercurius",
        "send_msg",
        "events.update",
        "{\"path\":\"/z/home/alice/a\"}",
    ];

    let cli = Cli::try_parse_from(args).expect("Should parse send_msg command");

    match cli.command {
        Commands::SendMsg { key, body } => {
            assert_eq!(key, "events.update");
            assert_eq!(body, "{\"path\":\"/z/home/alice/a\"}");
        }
        _ => panic!("Expected SendMsg command"),
    }
}

#[test]
fn test_link_bisque_command_parsing() {
    let args = vec![
        "mercurius",
        "--config",
        "/etc/mercurius/config.yml",
        "link_bisque",
        "alice",
        "/z/home/alice/img.tif",
    ];

    let cli = Cli::try_parse_from(args).expect("Should parse link_bisque command");

    assert_eq!(cli.config, Some(PathBuf::from("/etc/mercurius/config.yml")));
    match cli.command {
        Commands::LinkBisque {
            irods_username,
            irods_path,
        } => {
            assert_eq!(irods_username, "alice");
            assert_eq!(irods_path, "/z/home/alice/img.tif");
        }
        _ => panic!("Expected LinkBisque command"),
    }
}

#[test]
fn test_remove_bisque_command_parsing() {
    let args = vec!["mercurius", "remove_bisque", "alice", "/z/home/alice/a"];

    let cli = Cli::try_parse_from(args).expect("Should parse remove_bisque command");

    match cli.command {
        Commands::RemoveBisque {
            irods_username,
            irods_path,
        } => {
            assert_eq!(irods_username, "alice");
            assert_eq!(irods_path, "/z/home/alice/a");
        }
        _ => panic!("Expected RemoveBisque command"),
    }
}

#[test]
fn test_move_bisque_command_parsing() {
    let args = vec![
        "mercurius",
        "move_bisque",
        "alice",
        "/z/home/alice/a",
        "/z/home/alice/b",
    ];

    let cli = Cli::try_parse_from(args).expect("Should parse move_bisque command");

    match cli.command {
        Commands::MoveBisque {
            irods_username,
            source_irods_path,
            dest_irods_path,
        } => {
            assert_eq!(irods_username, "alice");
            assert_eq!(source_irods_path, "/z/home/alice/a");
            assert_eq!(dest_irods_path, "/z/home/alice/b");
        }
        _ => panic!("Expected MoveBisque command"),
    }
}

#[test]
fn test_debug_flag_is_global() {
    let args = vec!["mercurius", "send_msg", "--debug", "k", "b"];

    let cli = Cli::try_parse_from(args).expect("Should parse with trailing --debug");
    assert!(cli.debug);
}

#[test]
fn test_missing_arguments_are_rejected() {
    assert!(Cli::try_parse_from(vec!["mercurius", "send_msg", "k"]).is_err());
    assert!(Cli::try_parse_from(vec!["mercurius", "move_bisque", "alice", "/a"]).is_err());
    assert!(Cli::try_parse_from(vec!["mercurius"]).is_err());
}
