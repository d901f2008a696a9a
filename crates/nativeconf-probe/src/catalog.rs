//! Probe Catalog
//!
//! The declared probe set: structs with their fields, constant groups, and
//! the headers scanned for typedefs. The built-in catalog covers what the
//! runtime's socket, file, process and signal support reads at startup.

use std::path::Path;

use nativeconf_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CAST, DEFAULT_FORMAT};

/// Every probe to run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub structs: Vec<StructDecl>,
    #[serde(default)]
    pub constant_groups: Vec<ConstantGroupDecl>,
    #[serde(default)]
    pub typedef_headers: Vec<String>,
}

/// A struct and the fields to measure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    #[serde(default)]
    pub includes: Vec<String>,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    /// Type tag passed through to the configuration
    #[serde(default, rename = "type")]
    pub type_tag: Option<String>,
}

/// A named group of macro constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantGroupDecl {
    pub name: String,
    #[serde(default)]
    pub includes: Vec<String>,
    pub batches: Vec<ConstantBatch>,
}

/// Constants sharing one printf format and cast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantBatch {
    pub names: Vec<String>,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_cast")]
    pub cast: String,
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

fn default_cast() -> String {
    DEFAULT_CAST.to_string()
}

fn words(list: &str) -> Vec<String> {
    list.split_whitespace().map(String::from).collect()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn is_header(header: &str) -> bool {
    !header.is_empty()
        && !header
            .chars()
            .any(|c| c == '>' || c == '<' || c == '"' || c.is_whitespace())
}

impl StructDecl {
    pub fn new(name: &str, includes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            includes: includes.iter().map(|s| s.to_string()).collect(),
            fields: Vec::new(),
        }
    }

    /// Add a field with a type tag
    pub fn field(mut self, name: &str, type_tag: &str) -> Self {
        self.fields.push(FieldDecl {
            name: name.to_string(),
            type_tag: Some(type_tag.to_string()),
        });
        self
    }

    /// Add a field without a type tag
    pub fn untyped(mut self, name: &str) -> Self {
        self.fields.push(FieldDecl {
            name: name.to_string(),
            type_tag: None,
        });
        self
    }
}

impl ConstantGroupDecl {
    pub fn new(name: &str, includes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            includes: includes.iter().map(|s| s.to_string()).collect(),
            batches: Vec::new(),
        }
    }

    /// Add whitespace-separated names printed as `long`
    pub fn consts(self, names: &str) -> Self {
        self.consts_as(names, DEFAULT_FORMAT, DEFAULT_CAST)
    }

    pub fn consts_as(mut self, names: &str, format: &str, cast: &str) -> Self {
        self.batches.push(ConstantBatch {
            names: words(names),
            format: format.to_string(),
            cast: cast.to_string(),
        });
        self
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a YAML file
    pub fn load_yaml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let catalog: Catalog = serde_yaml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check that every name can be pasted into generated C source
    pub fn validate(&self) -> Result<()> {
        let check_ident = |what: &str, name: &str| {
            if is_identifier(name) {
                Ok(())
            } else {
                Err(Error::Config(format!("invalid {} name: {:?}", what, name)))
            }
        };
        let check_headers = |headers: &[String]| {
            match headers.iter().find(|h| !is_header(h)) {
                Some(bad) => Err(Error::Config(format!("invalid header: {:?}", bad))),
                None => Ok(()),
            }
        };

        for st in &self.structs {
            check_ident("struct", &st.name)?;
            check_headers(&st.includes)?;
            for field in &st.fields {
                check_ident("field", &field.name)?;
            }
        }
        for group in &self.constant_groups {
            check_ident("constant group", &group.name)?;
            check_headers(&group.includes)?;
            for batch in &group.batches {
                if batch.format.contains('"') || batch.cast.contains('"') {
                    return Err(Error::Config(format!(
                        "format and cast of group {} must not contain quotes",
                        group.name
                    )));
                }
                for name in &batch.names {
                    check_ident("constant", name)?;
                }
            }
        }
        check_headers(&self.typedef_headers)
    }

    /// The catalog the runtime expects
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.load_builtin_structs();
        catalog.load_builtin_constants();
        catalog.typedef_headers = words("stdint.h sys/types.h sys/socket.h sys/resource.h");
        catalog
    }

    fn load_builtin_structs(&mut self) {
        self.structs = vec![
            StructDecl::new("addrinfo", &["sys/socket.h", "netdb.h"])
                .field("ai_flags", "int")
                .field("ai_family", "int")
                .field("ai_socktype", "int")
                .field("ai_protocol", "int")
                .field("ai_addrlen", "int")
                .field("ai_addr", "pointer")
                .field("ai_canonname", "string")
                .field("ai_next", "pointer"),
            StructDecl::new("ifaddrs", &["sys/types.h", "ifaddrs.h"])
                .field("ifa_next", "pointer")
                .field("ifa_name", "string")
                .field("ifa_flags", "int")
                .field("ifa_addr", "pointer")
                .field("ifa_netmask", "pointer")
                .field("ifa_broadaddr", "pointer")
                .field("ifa_dstaddr", "pointer"),
            StructDecl::new("sockaddr", &["sys/socket.h"])
                .field("sa_data", "char_array")
                .field("sa_family", "sa_family_t"),
            StructDecl::new(
                "sockaddr_in",
                &["netinet/in.h", "sys/socket.h", "fcntl.h", "sys/stat.h"],
            )
            .field("sin_family", "sa_family_t")
            .field("sin_port", "ushort")
            .untyped("sin_addr")
            .field("sin_zero", "char_array"),
            StructDecl::new(
                "sockaddr_in6",
                &["netinet/in.h", "sys/socket.h", "fcntl.h", "sys/stat.h"],
            )
            .field("sin6_family", "sa_family_t")
            .field("sin6_port", "ushort")
            .untyped("sin6_flowinfo")
            .field("sin6_addr", "char_array")
            .untyped("sin6_scope_id"),
            StructDecl::new("sockaddr_un", &["sys/un.h"])
                .field("sun_family", "sa_family_t")
                .field("sun_path", "char_array"),
            StructDecl::new("hostent", &["netdb.h"])
                .field("h_name", "string")
                .field("h_aliases", "pointer")
                .field("h_addrtype", "int")
                .field("h_length", "int")
                .field("h_addr_list", "pointer"),
            StructDecl::new("linger", &["sys/socket.h"])
                .field("l_onoff", "int")
                .field("l_linger", "int"),
            StructDecl::new("iovec", &["sys/socket.h"])
                .field("iov_base", "pointer")
                .field("iov_len", "size_t"),
            StructDecl::new("msghdr", &["sys/socket.h"])
                .field("msg_name", "pointer")
                .field("msg_namelen", "int")
                .field("msg_iov", "pointer")
                .field("msg_iovlen", "size_t")
                .field("msg_control", "pointer")
                .field("msg_controllen", "size_t")
                .field("msg_flags", "int"),
            StructDecl::new("servent", &["netdb.h"])
                .field("s_name", "pointer")
                .field("s_aliases", "pointer")
                .field("s_port", "int")
                .field("s_proto", "pointer"),
        ];
    }

    fn load_builtin_constants(&mut self) {
        let errno = ConstantGroupDecl::new("errno", &["errno.h"]).consts(
            "EPERM ENOENT ESRCH EINTR EIO ENXIO E2BIG ENOEXEC EBADF ECHILD EDEADLK ENOMEM
             EACCES EFAULT ENOTBLK EBUSY EEXIST EXDEV ENODEV ENOTDIR EISDIR EINVAL ENFILE
             EMFILE ENOTTY ETXTBSY EFBIG ENOSPC ESPIPE EROFS EMLINK EPIPE EDOM ERANGE
             EWOULDBLOCK EAGAIN EINPROGRESS EALREADY ENOTSOCK EDESTADDRREQ EMSGSIZE
             EPROTOTYPE ENOPROTOOPT EPROTONOSUPPORT ESOCKTNOSUPPORT EOPNOTSUPP
             EPFNOSUPPORT EAFNOSUPPORT EADDRINUSE EADDRNOTAVAIL ENETDOWN ENETUNREACH
             ENETRESET ECONNABORTED ECONNRESET ENOBUFS EISCONN ENOTCONN ESHUTDOWN
             ETOOMANYREFS ETIMEDOUT ECONNREFUSED ELOOP ENAMETOOLONG EHOSTDOWN
             EHOSTUNREACH ENOTEMPTY EUSERS EDQUOT ESTALE EREMOTE ENOLCK ENOSYS EOVERFLOW
             EIDRM ENOMSG EILSEQ EBADMSG EMULTIHOP ENODATA ENOLINK ENOSR ENOSTR EPROTO
             ETIME",
        );

        let file = ConstantGroupDecl::new(
            "file",
            &["stdio.h", "fcntl.h", "fnmatch.h", "sys/stat.h"],
        )
        .consts(
            "FNM_CASEFOLD FNM_DOTMATCH FNM_EXTGLOB FNM_NOESCAPE FNM_PATHNAME FNM_SYSCASE
             LOCK_SH LOCK_EX LOCK_NB LOCK_UN
             O_RDONLY O_WRONLY O_RDWR O_ACCMODE O_CREAT O_EXCL O_NOCTTY O_TRUNC O_APPEND
             O_NONBLOCK O_NDELAY O_SYNC O_TMPFILE
             S_IRUSR S_IWUSR S_IXUSR S_IRGRP S_IWGRP S_IXGRP S_IROTH S_IWOTH S_IXOTH
             S_IFMT S_IFIFO S_IFCHR S_IFDIR S_IFBLK S_IFREG S_IFLNK S_IFSOCK S_IFWHT
             S_ISUID S_ISGID S_ISVTX",
        );

        let io = ConstantGroupDecl::new("io", &["stdio.h"]).consts("SEEK_SET SEEK_CUR SEEK_END");

        let fcntl = ConstantGroupDecl::new("fcntl", &["unistd.h", "fcntl.h"]).consts(
            "F_GETFL F_SETFL
             F_DUPFD F_GETFD F_SETFD FD_CLOEXEC
             F_GETOWN F_SETOWN
             F_GETLK F_SETLK F_SETLKW
             F_RDLCK F_UNLCK F_WRLCK
             F_CHKCLEAN F_PREALLOCATE F_SETSIZE F_RDADVISE F_RDAHEAD
             F_READBOOTSTRAP F_WRITEBOOTSTRAP F_NOCACHE F_LOG2PHYS F_GETPATH F_FULLFSYNC
             F_PATHPKG_CHECK F_FREEZE_FS F_THAW_FS F_GLOBAL_NOCACHE F_ADDSIG
             F_MARKDEPENDENCY F_ALLOCATECONTIG F_ALLOCATEALL",
        );

        let mut socket = ConstantGroupDecl::new(
            "socket",
            &[
                "sys/types.h",
                "sys/socket.h",
                "netdb.h",
                "netinet/in_systm.h",
                "netinet/tcp.h",
                "netinet/udp.h",
                "netinet/in.h",
                "net/if.h",
            ],
        );
        for family in words("APPLETALK AX25 INET INET6 IPX ISDN LOCAL MAX PACKET ROUTE SNA UNIX UNSPEC") {
            socket = socket.consts(&format!("AF_{family} PF_{family}"));
        }
        let socket = socket.consts("PF_KEY").consts(
            "AI_ADDRCONFIG AI_ALL AI_CANONNAME AI_NUMERICHOST
             AI_NUMERICSERV AI_PASSIVE AI_V4MAPPED

             EAI_ADDRFAMILY EAI_AGAIN EAI_BADFLAGS EAI_FAIL EAI_FAMILY EAI_MEMORY
             EAI_NODATA EAI_NONAME EAI_OVERFLOW EAI_SERVICE EAI_SOCKTYPE EAI_SYSTEM

             IFF_ALLMULTI IFF_AUTOMEDIA IFF_BROADCAST IFF_DEBUG IFF_DYNAMIC
             IFF_LOOPBACK IFF_MASTER IFF_MULTICAST IFF_NOARP IFF_NOTRAILERS
             IFF_POINTOPOINT IFF_PORTSEL IFF_PROMISC IFF_RUNNING IFF_SLAVE IFF_UP

             IF_NAMESIZE

             INADDR_ALLHOSTS_GROUP INADDR_ANY INADDR_BROADCAST INADDR_LOOPBACK
             INADDR_MAX_LOCAL_GROUP INADDR_NONE INADDR_UNSPEC_GROUP

             INET6_ADDRSTRLEN INET_ADDRSTRLEN

             IPPORT_RESERVED IPPORT_USERRESERVED

             IPPROTO_AH IPPROTO_DSTOPTS IPPROTO_EGP IPPROTO_ESP IPPROTO_FRAGMENT
             IPPROTO_HOPOPTS IPPROTO_ICMP IPPROTO_ICMPV6 IPPROTO_IDP IPPROTO_IGMP
             IPPROTO_IP IPPROTO_IPV6 IPPROTO_NONE IPPROTO_PUP IPPROTO_RAW
             IPPROTO_ROUTING IPPROTO_TCP IPPROTO_TP IPPROTO_UDP

             IPV6_CHECKSUM IPV6_DONTFRAG IPV6_DSTOPTS IPV6_HOPLIMIT IPV6_HOPOPTS
             IPV6_JOIN_GROUP IPV6_LEAVE_GROUP IPV6_MULTICAST_HOPS IPV6_MULTICAST_IF
             IPV6_MULTICAST_LOOP IPV6_NEXTHOP IPV6_PATHMTU IPV6_PKTINFO
             IPV6_RECVDSTOPTS IPV6_RECVHOPLIMIT IPV6_RECVHOPOPTS IPV6_RECVPATHMTU
             IPV6_RECVPKTINFO IPV6_RECVRTHDR IPV6_RECVTCLASS IPV6_RTHDR
             IPV6_RTHDRDSTOPTS IPV6_RTHDR_TYPE_0 IPV6_TCLASS IPV6_UNICAST_HOPS
             IPV6_V6ONLY

             IP_ADD_MEMBERSHIP IP_ADD_SOURCE_MEMBERSHIP IP_BLOCK_SOURCE
             IP_DEFAULT_MULTICAST_LOOP IP_DEFAULT_MULTICAST_TTL IP_DROP_MEMBERSHIP
             IP_DROP_SOURCE_MEMBERSHIP IP_FREEBIND IP_HDRINCL IP_IPSEC_POLICY
             IP_MAX_MEMBERSHIPS IP_MINTTL IP_MSFILTER IP_MTU IP_MTU_DISCOVER
             IP_MULTICAST_IF IP_MULTICAST_LOOP IP_MULTICAST_TTL IP_OPTIONS IP_PASSSEC
             IP_PKTINFO IP_PKTOPTIONS IP_PMTUDISC_DO IP_PMTUDISC_DONT IP_PMTUDISC_WANT
             IP_RECVERR IP_RECVOPTS IP_RECVRETOPTS IP_RECVTOS IP_RECVTTL IP_RETOPTS
             IP_ROUTER_ALERT IP_TOS IP_TRANSPARENT IP_TTL IP_UNBLOCK_SOURCE
             IP_XFRM_POLICY

             MCAST_BLOCK_SOURCE MCAST_EXCLUDE MCAST_INCLUDE MCAST_JOIN_GROUP
             MCAST_JOIN_SOURCE_GROUP MCAST_LEAVE_GROUP MCAST_LEAVE_SOURCE_GROUP
             MCAST_MSFILTER MCAST_UNBLOCK_SOURCE

             MSG_CONFIRM MSG_CTRUNC MSG_DONTROUTE MSG_DONTWAIT MSG_EOR MSG_ERRQUEUE
             MSG_FASTOPEN MSG_FIN MSG_MORE MSG_NOSIGNAL MSG_OOB MSG_PEEK MSG_PROXY
             MSG_RST MSG_SYN MSG_TRUNC MSG_WAITALL

             NI_DGRAM NI_MAXHOST NI_MAXSERV NI_NAMEREQD NI_NOFQDN NI_NUMERICHOST
             NI_NUMERICSERV

             SCM_CREDENTIALS SCM_RIGHTS SCM_TIMESTAMP SCM_TIMESTAMPING SCM_TIMESTAMPNS
             SCM_WIFI_STATUS

             SEEK_CUR SEEK_DATA SEEK_END SEEK_HOLE SEEK_SET

             SHUT_RD SHUT_RDWR SHUT_WR

             SOCK_DGRAM SOCK_PACKET SOCK_RAW SOCK_RDM SOCK_SEQPACKET SOCK_STREAM

             SOL_IP SOL_SOCKET SOL_TCP SOL_UDP

             SO_ACCEPTCONN SO_ATTACH_FILTER SO_BINDTODEVICE SO_BPF_EXTENSIONS
             SO_BROADCAST SO_BUSY_POLL SO_DEBUG SO_DETACH_FILTER SO_DOMAIN SO_DONTROUTE
             SO_ERROR SO_GET_FILTER SO_KEEPALIVE SO_LINGER SO_LOCK_FILTER SO_MARK
             SO_MAX_PACING_RATE SO_NOFCS SO_NO_CHECK SO_OOBINLINE SO_PASSCRED
             SO_PASSSEC SO_PEEK_OFF SO_PEERCRED SO_PEERNAME SO_PEERSEC SO_PRIORITY
             SO_PROTOCOL SO_RCVBUF SO_RCVBUFFORCE SO_RCVLOWAT SO_RCVTIMEO SO_REUSEADDR
             SO_REUSEPORT SO_RXQ_OVFL SO_SECURITY_AUTHENTICATION
             SO_SECURITY_ENCRYPTION_NETWORK SO_SECURITY_ENCRYPTION_TRANSPORT
             SO_SELECT_ERR_QUEUE SO_SNDBUF SO_SNDBUFFORCE SO_SNDLOWAT SO_SNDTIMEO
             SO_TIMESTAMP SO_TIMESTAMPING SO_TIMESTAMPNS SO_TYPE SO_WIFI_STATUS

             TCP_CONGESTION TCP_COOKIE_TRANSACTIONS TCP_CORK TCP_DEFER_ACCEPT
             TCP_FASTOPEN TCP_INFO TCP_KEEPCNT TCP_KEEPIDLE TCP_KEEPINTVL TCP_LINGER2
             TCP_MAXSEG TCP_MD5SIG TCP_NODELAY TCP_QUEUE_SEQ TCP_QUICKACK TCP_REPAIR
             TCP_REPAIR_OPTIONS TCP_REPAIR_QUEUE TCP_SYNCNT TCP_THIN_DUPACK
             TCP_THIN_LINEAR_TIMEOUTS TCP_TIMESTAMP TCP_USER_TIMEOUT TCP_WINDOW_CLAMP

             UDP_CORK
             SOMAXCONN",
        );

        let process = ConstantGroupDecl::new("process", &["sys/wait.h", "sys/resource.h", "stdlib.h"])
            .consts(
                "EXIT_SUCCESS EXIT_FAILURE
                 WNOHANG WUNTRACED
                 PRIO_PROCESS PRIO_PGRP PRIO_USER
                 RLIMIT_CPU RLIMIT_FSIZE RLIMIT_DATA RLIMIT_STACK RLIMIT_CORE RLIMIT_RSS
                 RLIMIT_NPROC RLIMIT_NOFILE RLIMIT_MEMLOCK RLIMIT_AS RLIMIT_SBSIZE
                 RLIMIT_RTPRIO RLIMIT_RTTIME RLIMIT_SIGPENDING RLIMIT_MSGQUEUE RLIMIT_NICE",
            )
            // Limit sentinels are unsigned 64-bit; printing them as long would wrap
            .consts_as(
                "RLIM_INFINITY RLIM_SAVED_MAX RLIM_SAVED_CUR",
                "%llu",
                "(unsigned long long)",
            );

        // Signal names follow MRI's signal.c
        let signal = ConstantGroupDecl::new("signal", &["signal.h", "sys/signal.h"]).consts(
            "SIGHUP SIGINT SIGQUIT SIGILL SIGTRAP SIGIOT SIGABRT SIGEMT SIGFPE SIGKILL
             SIGBUS SIGSEGV SIGSYS SIGPIPE SIGALRM SIGTERM SIGURG SIGSTOP SIGTSTP
             SIGCONT SIGCHLD SIGCLD SIGCHLD SIGTTIN SIGTTOU SIGIO SIGXCPU SIGXFSZ
             SIGVTALRM SIGPROF SIGWINCH SIGUSR1 SIGUSR2 SIGLOST SIGMSG SIGPWR SIGPOLL
             SIGDANGER SIGMIGRATE SIGPRE SIGGRANT SIGRETRACT SIGSOUND SIGINFO",
        );

        let dlopen = ConstantGroupDecl::new("dlopen", &["dlfcn.h"])
            .consts("RTLD_LAZY RTLD_NOW RTLD_LOCAL RTLD_GLOBAL");

        self.constant_groups = vec![errno, file, io, fcntl, socket, process, signal, dlopen];
    }
}
