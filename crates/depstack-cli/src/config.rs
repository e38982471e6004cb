//! The static package configuration table.
//!
//! One entry per buildable package, in build order: toolchain bootstrap
//! first (autoconf through pkg-config), then the C libraries, then getdns
//! itself, which links against everything before it. Configure strings embed
//! the install root so each package builds against its predecessors.
//!
//! Upstream fingerprints are deliberately absent: the original provisioning
//! data never carried usable digests, and the pipeline treats verification
//! as optional per package. Add them with [`PackageSpec::fingerprint`] when
//! upstream publishes SHA-256 sums.

use std::path::Path;

use anyhow::{bail, Result};
use depstack_core::package::{find_package, PackageSpec};

/// Linker flag keeping Mach-O headers padded so install names can be
/// rewritten when the libraries are staged into a bundle later.
const HEADERPAD: &str = "-Wl,-headerpad_max_install_names";

/// The full package chain in build order.
pub fn packages(install_root: &Path) -> Vec<PackageSpec> {
    let prefix = install_root.display();

    vec![
        PackageSpec::new(
            "autoconf",
            "2.69",
            "http://ftpmirror.gnu.org/autoconf/autoconf-2.69.tar.gz",
            format!("./configure --prefix={prefix}"),
        ),
        PackageSpec::new(
            "automake",
            "1.15",
            "http://ftpmirror.gnu.org/automake/automake-1.15.tar.gz",
            format!("./configure --prefix={prefix}"),
        ),
        PackageSpec::new(
            "libtool",
            "2.4.6",
            "http://ftpmirror.gnu.org/libtool/libtool-2.4.6.tar.gz",
            format!("./configure --prefix={prefix}"),
        ),
        PackageSpec::new(
            "pkg-config",
            "0.29.2",
            "https://pkg-config.freedesktop.org/releases/pkg-config-0.29.2.tar.gz",
            format!("./configure --with-internal-glib --prefix={prefix}"),
        ),
        // GitHub archive zips are named by tag but unpack as repo-tag.
        PackageSpec::new(
            "check",
            "0.11.0",
            "https://github.com/libcheck/check/archive/0.11.0.zip",
            format!("autoreconf -i && ./configure --prefix={prefix}"),
        )
        .archive("0.11.0.zip")
        .source_dir("check-0.11.0")
        .with_ccache(),
        PackageSpec::new(
            "openssl",
            "1.1.0f",
            "http://openssl.org/source/openssl-1.1.0f.tar.gz",
            format!("./Configure darwin64-x86_64-cc --shared --prefix={prefix} {HEADERPAD}"),
        )
        .test_command("make test")
        .with_ccache(),
        PackageSpec::new(
            "libevent",
            "2.1.8-stable",
            "https://github.com/libevent/libevent/releases/download/release-2.1.8-stable/libevent-2.1.8-stable.tar.gz",
            format!(
                "./configure --prefix={prefix} CPPFLAGS=-I{prefix}/include LDFLAGS=\"{HEADERPAD} -L{prefix}/lib\""
            ),
        )
        .test_command("make check")
        .with_ccache(),
        PackageSpec::new(
            "unbound",
            "1.6.3",
            "http://unbound.nlnetlabs.nl/downloads/unbound-1.6.3.tar.gz",
            format!(
                "./configure --prefix={prefix} --with-ssl={prefix} --with-conf-file=. LDFLAGS={HEADERPAD}"
            ),
        )
        .test_command("make test")
        .with_ccache(),
        PackageSpec::new(
            "libidn",
            "1.33",
            "http://ftp.gnu.org/gnu/libidn/libidn-1.33.tar.gz",
            format!("./configure --prefix={prefix} LDFLAGS={HEADERPAD}"),
        )
        .test_command("make check")
        .with_ccache(),
        // Release URLs use the version with dots swapped for dashes.
        PackageSpec::new(
            "getdns",
            "1.1.1",
            "https://getdnsapi.net/releases/getdns-1-1-1/getdns-1.1.1.tar.gz",
            format!(
                "./configure --prefix={prefix} --with-ssl={prefix} --with-libunbound={prefix} \
                 --with-libidn={prefix} --with-libevent --enable-debug-daemon LDFLAGS={HEADERPAD}"
            ),
        )
        .test_command("make check")
        .with_ccache(),
    ]
}

/// Select packages by name, preserving declaration order.
///
/// An unknown name is an error: silently building nothing is exactly the
/// missing-key failure mode this table exists to eliminate.
pub fn select(specs: &[PackageSpec], names: &[String]) -> Result<Vec<PackageSpec>> {
    for name in names {
        if find_package(specs, name).is_none() {
            bail!("unknown package `{name}`; run `depstack list` for the configured set");
        }
    }
    Ok(specs
        .iter()
        .filter(|s| names.iter().any(|n| n == &s.name))
        .cloned()
        .collect())
}
